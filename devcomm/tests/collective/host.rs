use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use super::helpers::run_ranks;

#[test]
fn test_cpu_barrier_holds_everyone() {
    let world = 4;
    let arrived = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&arrived);
    let results = run_ranks(world, move |comm| {
        let mut observed = Vec::new();
        for round in 1..=3 {
            seen.fetch_add(1, Ordering::SeqCst);
            comm.cpu_barrier().unwrap();
            // Nobody leaves round `n` before all ranks have entered it.
            observed.push(seen.load(Ordering::SeqCst) >= round * world);
            comm.cpu_barrier().unwrap();
        }
        observed
    });
    for observed in results {
        assert!(observed.iter().all(|&ok| ok), "{observed:?}");
    }
    assert_eq!(arrived.load(Ordering::SeqCst), 3 * world);
}

#[test]
fn test_cpu_broadcast_sequence() {
    let results = run_ranks(3, |comm| {
        let rank = comm.rank();
        let first = comm
            .cpu_broadcast(format!("hello from {rank}").as_bytes(), 0)
            .unwrap();
        let second = comm.cpu_broadcast(&[rank as u8; 4], 2).unwrap();
        (first, second)
    });
    for (first, second) in results {
        assert_eq!(first, b"hello from 0");
        assert_eq!(second, vec![2u8; 4]);
    }
}

#[test]
fn test_cpu_broadcast_rejects_bad_root() {
    let results = run_ranks(2, |comm| {
        let err = comm.cpu_broadcast(b"x", 2).unwrap_err();
        // Still usable afterwards: the failed call consumed no sequence number.
        let ok = comm.cpu_broadcast(b"y", 0).unwrap();
        (err.is_validation(), ok)
    });
    for (validation, ok) in results {
        assert!(validation);
        assert_eq!(ok, b"y");
    }
}
