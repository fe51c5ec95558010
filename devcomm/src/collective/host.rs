//! Host-side synchronization through the rendezvous store.
//!
//! Nothing here touches the device transport.

use crate::error::Result;
use crate::store::{BARRIER_KEY, StoreClient};
use crate::types::{GroupConfig, Rank};

/// Block until every rank of `group` has called this.
pub(crate) async fn cpu_barrier(store: &StoreClient, group: GroupConfig) -> Result<()> {
    store.barrier(BARRIER_KEY, group.world_size()).await
}

/// Key a broadcast with sequence number `seq` is published under.
pub(crate) fn broadcast_key(seq: u64) -> String {
    format!("broadcast/{seq}")
}

/// Broadcast a small host value from `root`; `value` is ignored elsewhere.
///
/// Ranks must issue broadcasts in the same order, so that the `seq`-th
/// broadcast of every rank refers to the same key. Root removes the key
/// once every rank has passed the closing barrier.
pub(crate) async fn cpu_broadcast(
    store: &StoreClient,
    group: GroupConfig,
    seq: u64,
    value: &[u8],
    root: Rank,
) -> Result<Vec<u8>> {
    group.check_rank(root)?;
    let key = broadcast_key(seq);
    let world = group.world_size();

    if group.rank() == root {
        store.set(&key, value).await?;
        store.barrier(BARRIER_KEY, world).await?;
        store.delete(&key).await?;
        tracing::debug!(key, len = value.len(), "host broadcast sent");
        Ok(value.to_vec())
    } else {
        let received = store.get(&key).await?;
        store.barrier(BARRIER_KEY, world).await?;
        Ok(received)
    }
}
