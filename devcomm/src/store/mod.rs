//! Rendezvous store: a tiny key/value service used for bootstrap and
//! host-side synchronization, never for bulk data.
//!
//! Two roles:
//! - [`StoreServer`] (owner): binds the listener and serves requests.
//! - [`StoreClient`] (participant): a stateless network proxy.
//!
//! The process that owns the server is also a participant and talks to
//! its own store through a `StoreClient` like everyone else.

mod client;
mod server;

pub use client::StoreClient;
pub use server::StoreServer;

use crate::error::{CommError, Result};

/// Key under which the session identifier is published.
pub const SESSION_ID_KEY: &str = "session_id";

/// Key of the barrier generation counter.
pub const BARRIER_KEY: &str = "barrier";

pub(crate) fn encode_counter(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

pub(crate) fn decode_counter(key: &str, bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| CommError::DecodeFailed(format!(
        "value under {key:?} is not a counter ({} bytes)",
        bytes.len()
    )))?;
    Ok(u64::from_le_bytes(raw))
}

/// Counter value every participant waits for after `arrivals` check-ins to a
/// barrier of `world_size` members.
///
/// Arrivals are numbered from 1; the n-th arrival belongs to generation
/// `ceil(n / world_size)`, which completes when the counter reaches
/// `generation * world_size`.
pub fn barrier_target(arrivals: u64, world_size: u32) -> u64 {
    let world = u64::from(world_size.max(1));
    arrivals.div_ceil(world) * world
}
