use devcomm::{BufferView, ReduceOp};

use super::helpers::run_ranks;

#[test]
fn test_allreduce_4_ranks_sum() {
    let results = run_ranks(4, |comm| {
        let input = vec![(comm.rank() + 1) as f32; 16];
        let mut output = vec![0f32; 16];
        let in_view = BufferView::from_slice(&input, &[16]).unwrap();
        let out_view = BufferView::from_mut_slice(&mut output, &[16]).unwrap();
        unsafe { comm.all_reduce(&in_view, &out_view, ReduceOp::Sum, None).unwrap() };
        output
    });
    for (rank, out) in results.iter().enumerate() {
        assert_eq!(out, &vec![10.0f32; 16], "rank {rank} allreduce failed");
    }
}

#[test]
fn test_allreduce_in_place_max_i64() {
    let results = run_ranks(3, |comm| {
        let mut data = vec![comm.rank() as i64 * 7 - 3; 5];
        let view = BufferView::from_mut_slice(&mut data, &[5]).unwrap();
        unsafe { comm.all_reduce(&view, &view, ReduceOp::Max, None).unwrap() };
        data
    });
    for out in results {
        assert_eq!(out, vec![11i64; 5]);
    }
}

#[test]
fn test_allreduce_complex_sums_components() {
    let results = run_ranks(2, |comm| {
        let r = comm.rank() as f64;
        let input = vec![[r, -r]; 3];
        let mut output = vec![[0f64; 2]; 3];
        let in_view = BufferView::from_slice(&input, &[3]).unwrap();
        let out_view = BufferView::from_mut_slice(&mut output, &[3]).unwrap();
        unsafe { comm.all_reduce(&in_view, &out_view, ReduceOp::Sum, None).unwrap() };
        output
    });
    for out in results {
        assert_eq!(out, vec![[1.0, -1.0]; 3]);
    }
}

#[test]
fn test_reduce_to_root() {
    let results = run_ranks(3, |comm| {
        let input = vec![comm.rank() as u32 + 2; 4];
        let mut output = vec![0u32; 4];
        let in_view = BufferView::from_slice(&input, &[4]).unwrap();
        let out_view = BufferView::from_mut_slice(&mut output, &[4]).unwrap();
        unsafe { comm.reduce(&in_view, &out_view, 1, ReduceOp::Prod, None).unwrap() };
        output
    });
    assert_eq!(results[1], vec![24u32; 4]);
    assert_eq!(results[0], vec![0u32; 4]);
    assert_eq!(results[2], vec![0u32; 4]);
}

#[test]
fn test_broadcast_from_nonzero_root() {
    let results = run_ranks(4, |comm| {
        let mut data = if comm.rank() == 2 {
            vec![1.5f64, 2.5, 3.5]
        } else {
            vec![0f64; 3]
        };
        let view = BufferView::from_mut_slice(&mut data, &[3]).unwrap();
        unsafe { comm.broadcast(&view, 2, None).unwrap() };
        data
    });
    for out in results {
        assert_eq!(out, vec![1.5, 2.5, 3.5]);
    }
}

#[test]
fn test_reduce_scatter_and_all_gather() {
    let world = 3usize;
    let results = run_ranks(world as u32, move |comm| {
        // Chunk i of every rank holds i + 1, so the reduced chunk is 3 * (i + 1).
        let input: Vec<i32> = (0..world).flat_map(|i| vec![i as i32 + 1; 2]).collect();
        let mut mine = vec![0i32; 2];
        let in_view = BufferView::from_slice(&input, &[world, 2]).unwrap();
        let mine_view = BufferView::from_mut_slice(&mut mine, &[2]).unwrap();
        unsafe { comm.reduce_scatter(&in_view, &mine_view, ReduceOp::Sum, None).unwrap() };

        let mut gathered = vec![0i32; world * 2];
        let out_view = BufferView::from_mut_slice(&mut gathered, &[world * 2]).unwrap();
        unsafe { comm.all_gather(&mine_view, &out_view, None).unwrap() };
        (mine, gathered)
    });
    for (rank, (mine, gathered)) in results.into_iter().enumerate() {
        assert_eq!(mine, vec![3 * (rank as i32 + 1); 2]);
        assert_eq!(gathered, vec![3, 3, 6, 6, 9, 9]);
    }
}
