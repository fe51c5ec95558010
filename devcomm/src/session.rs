//! Session bootstrap: agree on one opaque session identifier across the group.
//!
//! Rank 0 asks the transport for a fresh identifier, publishes it in the
//! store and joins the barrier. Every other rank registers at the barrier,
//! blocks until the identifier is published, reads it, then completes the
//! barrier. If rank 0 dies before publishing, the other ranks block until
//! the store timeout (forever by default).

use crate::error::{CommError, Result};
use crate::store::{BARRIER_KEY, SESSION_ID_KEY, StoreClient};
use crate::transport::TransportProvider;
use crate::types::GroupConfig;

/// Size of a session identifier in bytes (the NCCL unique-id size).
pub const SESSION_ID_BYTES: usize = 128;

/// Opaque identifier every rank hands to the transport at construction.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId([u8; SESSION_ID_BYTES]);

impl SessionId {
    pub fn new(bytes: [u8; SESSION_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Parse an identifier received over the network.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; SESSION_ID_BYTES] = bytes.try_into().map_err(|_| CommError::Bootstrap {
            reason: format!(
                "session id must be {SESSION_ID_BYTES} bytes, got {}",
                bytes.len()
            ),
        })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_ID_BYTES] {
        &self.0
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// Run the bootstrap exchange and return the agreed identifier.
///
/// All ranks of `group` must call this collectively against the same store.
pub async fn bootstrap_session<P: TransportProvider>(
    store: &StoreClient,
    group: GroupConfig,
    provider: &P,
) -> Result<SessionId> {
    let world = group.world_size();

    if group.rank() == 0 {
        let id = provider.unique_id()?;
        store.set(SESSION_ID_KEY, id.as_bytes()).await?;
        tracing::info!(session = ?id, world, "session id published");
        store.barrier(BARRIER_KEY, world).await?;
        Ok(id)
    } else {
        let target = store.arrive(BARRIER_KEY, world).await?;
        let bytes = store.get(SESSION_ID_KEY).await?;
        let id = SessionId::from_bytes(&bytes)?;
        store.wait_until(BARRIER_KEY, target).await?;
        tracing::debug!(rank = group.rank(), session = ?id, "session id received");
        Ok(id)
    }
}
