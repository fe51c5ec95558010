//! The public operation surface, expressed against a [`Transport`].
//!
//! Every operation validates all of its buffers before issuing anything,
//! so a validation error never leaves partial work on the transport.
//! Composed operations (send/recv pairs, scatter, gather, all-to-all) run
//! inside a [`Batch`].
//!
//! [`Transport`]: crate::transport::Transport

mod alltoall;
mod batch;
mod direct;
mod gather;
mod helpers;
mod host;
mod point_to_point;
mod scatter;

pub use batch::Batch;

pub(crate) use alltoall::all_to_all;
pub(crate) use direct::{all_gather, all_reduce, broadcast, reduce, reduce_scatter};
pub(crate) use gather::gather;
pub(crate) use host::{cpu_barrier, cpu_broadcast};
pub(crate) use point_to_point::{recv, send, send_recv};
pub(crate) use scatter::scatter;
