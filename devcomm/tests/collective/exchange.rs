use devcomm::BufferView;

use super::helpers::run_ranks;

fn exchange_pair(len: usize) {
    let results = run_ranks(2, move |comm| {
        let peer = 1 - comm.rank();
        let fill = if comm.rank() == 0 { 0xA5u8 } else { 0x5Au8 };
        let input = vec![fill; len];
        let mut output = vec![0u8; len];
        let in_view = BufferView::from_slice(&input, &[len]).unwrap();
        let out_view = BufferView::from_mut_slice(&mut output, &[len]).unwrap();
        unsafe { comm.send_recv(&in_view, &out_view, peer, None).unwrap() };
        output
    });
    assert!(results[0].iter().all(|&b| b == 0x5A), "rank 0 got wrong data (len {len})");
    assert!(results[1].iter().all(|&b| b == 0xA5), "rank 1 got wrong data (len {len})");
}

#[test]
fn test_send_recv_single_element() {
    exchange_pair(1);
}

#[test]
fn test_send_recv_1k() {
    exchange_pair(1024);
}

#[test]
fn test_send_recv_1m() {
    exchange_pair(1 << 20);
}

#[test]
fn test_plain_send_then_recv() {
    let results = run_ranks(2, |comm| {
        let mut data = vec![0u64; 8];
        if comm.rank() == 0 {
            let payload: Vec<u64> = (0..8).collect();
            let view = BufferView::from_slice(&payload, &[2, 4]).unwrap();
            unsafe { comm.send(&view, 1, None).unwrap() };
        } else {
            let view = BufferView::from_mut_slice(&mut data, &[8]).unwrap();
            unsafe { comm.recv(&view, 0, None).unwrap() };
        }
        data
    });
    assert_eq!(results[1], (0..8).collect::<Vec<u64>>());
}

#[test]
fn test_user_batch_ring_shift() {
    let world = 4u32;
    let results = run_ranks(world, move |comm| {
        let rank = comm.rank();
        let next = (rank + 1) % world;
        let prev = (rank + world - 1) % world;
        let input = vec![rank as i32; 3];
        let mut output = vec![-1i32; 3];
        let in_view = BufferView::from_slice(&input, &[3]).unwrap();
        let out_view = BufferView::from_mut_slice(&mut output, &[3]).unwrap();

        // Recv before send inside the batch: grouping must avoid the deadlock.
        let batch = comm.batch(None).unwrap();
        unsafe {
            batch.recv(&out_view, prev).unwrap();
            batch.send(&in_view, next).unwrap();
        }
        batch.finish().unwrap();
        output
    });
    for rank in 0..world {
        let prev = (rank + world - 1) % world;
        assert_eq!(results[rank as usize], vec![prev as i32; 3]);
    }
}
