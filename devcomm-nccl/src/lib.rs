//! NCCL device transport for `devcomm`.
//!
//! Plug [`NcclProvider`] into `devcomm::Communicator::init` to run the
//! collective layer on CUDA device memory. Pointers handed to the
//! communicator must be device pointers on the device current for the
//! calling thread.

pub mod error;
pub mod group;
pub mod types;

pub use error::NcclTransportError;
pub use group::{NcclProvider, NcclTransport, session_from_unique_id, unique_id_from_session};
pub use types::{to_nccl_dtype, to_nccl_op};
