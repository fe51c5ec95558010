//! Collective communication for groups of processes, one device each.
//!
//! Rank 0 hosts a small rendezvous store; every rank uses it to agree on a
//! session identifier, then builds a [`Communicator`] on top of a device
//! [`Transport`]. Operations validate caller buffers ([`BufferView`])
//! before anything reaches the transport.

pub mod buffer;
pub mod collective;
pub mod comm;
pub mod config;
pub mod error;
pub mod protocol;
pub(crate) mod reduce;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod wire;

pub use buffer::{BufferView, Layout};
pub use collective::Batch;
pub use comm::{Communicator, StoreRole};
pub use config::BootstrapConfig;
pub use error::{CommError, Result};
pub use session::{SESSION_ID_BYTES, SessionId, bootstrap_session};
pub use store::{StoreClient, StoreServer};
pub use transport::loopback::{LoopbackFabric, LoopbackProvider, LoopbackTransport};
pub use transport::{Transport, TransportProvider};
pub use types::{Element, ElementType, GroupConfig, Rank, ReduceOp, StreamHandle, WireType};
pub use wire::{WireDescriptor, describe};
