use devcomm::BufferView;

use super::helpers::run_ranks;

#[test]
fn test_scatter_then_gather_round_trip() {
    let world = 4usize;
    let cols = 5usize;
    let original: Vec<f32> = (0..world * cols).map(|i| i as f32 * 0.5).collect();

    let expected = original.clone();
    let results = run_ranks(world as u32, move |comm| {
        let root = 0;
        let mut input = if comm.rank() == root {
            original.clone()
        } else {
            vec![0f32; world * cols]
        };
        let mut part = vec![0f32; cols];
        let in_view = BufferView::from_mut_slice(&mut input, &[world, cols]).unwrap();
        let part_view = BufferView::from_mut_slice(&mut part, &[cols]).unwrap();
        unsafe { comm.scatter(&in_view, &part_view, root, None).unwrap() };
        let received = part.clone();

        let mut gathered = vec![0f32; world * cols];
        let out_view = BufferView::from_mut_slice(&mut gathered, &[world, cols]).unwrap();
        unsafe { comm.gather(&part_view, &out_view, root, None).unwrap() };
        (received, gathered)
    });

    for (rank, (received, _)) in results.iter().enumerate() {
        assert_eq!(received, &expected[rank * cols..(rank + 1) * cols], "rank {rank} slice");
    }
    assert_eq!(results[0].1, expected);
}

#[test]
fn test_scatter_from_last_rank() {
    let world = 3u32;
    let results = run_ranks(world, move |comm| {
        let root = world - 1;
        let input: Vec<i32> = vec![10, 11, 20, 21, 30, 31];
        let mut part = vec![0i32; 2];
        // Non-root ranks pass a buffer of the wrong shape: only root's input is inspected.
        let in_view = if comm.rank() == root {
            BufferView::from_slice(&input, &[3, 2]).unwrap()
        } else {
            BufferView::from_slice(&input[..1], &[1]).unwrap()
        };
        let part_view = BufferView::from_mut_slice(&mut part, &[2]).unwrap();
        unsafe { comm.scatter(&in_view, &part_view, root, None).unwrap() };
        part
    });
    assert_eq!(results, vec![vec![10, 11], vec![20, 21], vec![30, 31]]);
}

#[test]
fn test_all_to_all_transposes() {
    let world = 3usize;
    let results = run_ranks(world as u32, move |comm| {
        let r = comm.rank() as u64;
        // Slice i of rank r holds 10 * r + i.
        let input: Vec<u64> = (0..world as u64).map(|i| 10 * r + i).collect();
        let mut output = vec![0u64; world];
        let in_view = BufferView::from_slice(&input, &[world]).unwrap();
        let out_view = BufferView::from_mut_slice(&mut output, &[world]).unwrap();
        unsafe { comm.all_to_all(&in_view, &out_view, None).unwrap() };
        output
    });
    for (r, out) in results.iter().enumerate() {
        let expected: Vec<u64> = (0..world as u64).map(|i| 10 * i + r as u64).collect();
        assert_eq!(out, &expected, "rank {r}");
    }
}

#[test]
fn test_single_rank_scatter_gather() {
    let results = run_ranks(1, |comm| {
        let input = vec![4u8, 5, 6];
        let mut part = vec![0u8; 3];
        let in_view = BufferView::from_slice(&input, &[1, 3]).unwrap();
        let part_view = BufferView::from_mut_slice(&mut part, &[3]).unwrap();
        unsafe { comm.scatter(&in_view, &part_view, 0, None).unwrap() };
        part
    });
    assert_eq!(results[0], vec![4, 5, 6]);
}
