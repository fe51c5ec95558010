use devcomm::store::SESSION_ID_KEY;
use devcomm::{
    BootstrapConfig, Communicator, GroupConfig, LoopbackFabric, LoopbackProvider, SessionId,
};
use std::sync::Arc;
use std::time::Duration;

use super::helpers::{free_port, run_ranks};

#[test]
fn test_every_rank_sees_published_session() {
    for world in [1u32, 2, 5] {
        let ids = run_ranks(world, |comm| {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let bytes = rt.block_on(comm.store().get(SESSION_ID_KEY)).unwrap();
            SessionId::from_bytes(&bytes).unwrap()
        });
        assert!(ids.windows(2).all(|w| w[0] == w[1]), "world {world}");
    }
}

#[test]
fn test_accessors() {
    let results = run_ranks(3, |comm| (comm.rank(), comm.world_size(), comm.group()));
    for (rank, (r, world, group)) in results.into_iter().enumerate() {
        assert_eq!(r as usize, rank);
        assert_eq!(world, 3);
        assert_eq!(group, GroupConfig::new(3, r).unwrap());
    }
}

#[test]
fn test_participant_without_owner_fails() {
    let config = BootstrapConfig {
        connect_timeout: Duration::from_millis(300),
        ..BootstrapConfig::new("127.0.0.1", free_port())
    };
    let provider = LoopbackProvider::new(Arc::new(LoopbackFabric::new()));
    let group = GroupConfig::new(2, 1).unwrap();
    let err = Communicator::init(&provider, group, &config).err().unwrap();
    assert!(matches!(err, devcomm::CommError::Bootstrap { .. }), "got {err:?}");
}

#[test]
fn test_rank_zero_times_out_waiting_for_peers() {
    let config = BootstrapConfig::new("127.0.0.1", free_port())
        .with_store_timeout(Duration::from_millis(300));
    let provider = LoopbackProvider::new(Arc::new(LoopbackFabric::new()));
    let group = GroupConfig::new(2, 0).unwrap();
    let err = Communicator::init(&provider, group, &config).err().unwrap();
    assert!(matches!(err, devcomm::CommError::Timeout { .. }), "got {err:?}");
}
