//! The seam to the device transport.
//!
//! The communicator never moves data itself: it validates and translates
//! buffers, then drives an implementation of [`Transport`]. Implementations
//! enqueue work on the given stream and return; calls on the same stream
//! execute in issue order.
//!
//! - [`loopback`] (built-in): ranks are threads of one process, memory is host memory.
//! - NCCL: provided by the `devcomm-nccl` crate.

pub mod loopback;

use crate::error::Result;
use crate::session::SessionId;
use crate::types::{Rank, ReduceOp, StreamHandle, WireType};

/// Creates transport handles for a group.
pub trait TransportProvider {
    type Transport: Transport;

    /// Generate a fresh session identifier. Called on rank 0 only.
    fn unique_id(&self) -> Result<SessionId>;

    /// Join the session as `rank` of `world_size`. Blocks until the
    /// transport has formed its group.
    fn init(&self, world_size: u32, session: &SessionId, rank: Rank) -> Result<Self::Transport>;
}

/// Device-level collective and point-to-point primitives.
///
/// All pointers are in the transport's memory space and all counts are in
/// units of `dtype`. Failures are fatal for the communicator: nothing is
/// retried.
pub trait Transport: Send {
    /// # Safety
    /// `send` and `recv` must be valid for `count` elements of `dtype`.
    unsafe fn all_reduce(
        &self,
        send: u64,
        recv: u64,
        count: usize,
        dtype: WireType,
        op: ReduceOp,
        stream: StreamHandle,
    ) -> Result<()>;

    /// # Safety
    /// `send` must be valid for `count` elements of `dtype`; `recv` too on `root`.
    #[allow(clippy::too_many_arguments)]
    unsafe fn reduce(
        &self,
        send: u64,
        recv: u64,
        count: usize,
        dtype: WireType,
        op: ReduceOp,
        root: Rank,
        stream: StreamHandle,
    ) -> Result<()>;

    /// # Safety
    /// `send` and `recv` must be valid for `count` elements of `dtype`
    /// (`send` is only read on `root`; they may alias).
    unsafe fn broadcast(
        &self,
        send: u64,
        recv: u64,
        count: usize,
        dtype: WireType,
        root: Rank,
        stream: StreamHandle,
    ) -> Result<()>;

    /// # Safety
    /// `send` must be valid for `recv_count * world_size` elements, `recv` for `recv_count`.
    unsafe fn reduce_scatter(
        &self,
        send: u64,
        recv: u64,
        recv_count: usize,
        dtype: WireType,
        op: ReduceOp,
        stream: StreamHandle,
    ) -> Result<()>;

    /// # Safety
    /// `send` must be valid for `send_count` elements, `recv` for `send_count * world_size`.
    unsafe fn all_gather(
        &self,
        send: u64,
        recv: u64,
        send_count: usize,
        dtype: WireType,
        stream: StreamHandle,
    ) -> Result<()>;

    /// # Safety
    /// `ptr` must be valid for reads of `count` elements of `dtype`.
    unsafe fn send(
        &self,
        ptr: u64,
        count: usize,
        dtype: WireType,
        peer: Rank,
        stream: StreamHandle,
    ) -> Result<()>;

    /// # Safety
    /// `ptr` must be valid for writes of `count` elements of `dtype`.
    unsafe fn recv(
        &self,
        ptr: u64,
        count: usize,
        dtype: WireType,
        peer: Rank,
        stream: StreamHandle,
    ) -> Result<()>;

    /// Start a group: subsequent calls are issued together at `group_end`.
    fn group_start(&self) -> Result<()>;

    /// Issue everything since the matching `group_start`.
    fn group_end(&self) -> Result<()>;

    /// Stream used when a caller does not name one.
    fn current_stream(&self) -> StreamHandle {
        StreamHandle::DEFAULT
    }
}
