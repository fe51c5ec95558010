use std::ffi::{c_char, c_void};
use std::mem::MaybeUninit;
use std::sync::Arc;

use cudarc::driver::CudaStream;
use cudarc::nccl::{result as nccl, sys};

use devcomm::{
    Rank, ReduceOp, SESSION_ID_BYTES, SessionId, StreamHandle, Transport, TransportProvider,
    WireType,
};

use crate::error::nccl_call;
use crate::types::{to_nccl_dtype, to_nccl_op};

/// Creates [`NcclTransport`]s on the calling thread's current CUDA device.
///
/// With a stream attached, that stream is what operations use when the
/// caller does not name one; otherwise they go to the legacy default stream.
#[derive(Clone, Default)]
pub struct NcclProvider {
    stream: Option<Arc<CudaStream>>,
}

impl NcclProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(stream: Arc<CudaStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

impl TransportProvider for NcclProvider {
    type Transport = NcclTransport;

    fn unique_id(&self) -> devcomm::Result<SessionId> {
        let id = nccl::get_uniqueid().map_err(nccl_call("ncclGetUniqueId"))?;
        Ok(session_from_unique_id(&id))
    }

    fn init(&self, world_size: u32, session: &SessionId, rank: Rank) -> devcomm::Result<NcclTransport> {
        let mut comm = MaybeUninit::uninit();
        unsafe {
            nccl::comm_init_rank(
                comm.as_mut_ptr(),
                world_size as i32,
                unique_id_from_session(session),
                rank as i32,
            )
            .map_err(nccl_call("ncclCommInitRank"))?;
        }
        tracing::debug!(rank, world_size, "NCCL communicator initialised");
        Ok(NcclTransport {
            comm: unsafe { comm.assume_init() },
            stream: self.stream.clone(),
            rank,
            world_size,
        })
    }
}

/// A raw `ncclComm_t` driven through cudarc's `result` layer.
///
/// Pointers stay `u64` device addresses end to end, so the `safe` layer's
/// typed slices are not used.
pub struct NcclTransport {
    comm: sys::ncclComm_t,
    stream: Option<Arc<CudaStream>>,
    rank: Rank,
    world_size: u32,
}

// SAFETY: the communicator handle is only used through `&self` calls that
// the owning `devcomm::Communicator` serializes.
unsafe impl Send for NcclTransport {}

impl NcclTransport {
    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }
}

fn cu_stream(stream: StreamHandle) -> sys::cudaStream_t {
    stream.as_u64() as sys::cudaStream_t
}

impl Transport for NcclTransport {
    unsafe fn all_reduce(
        &self,
        send: u64,
        recv: u64,
        count: usize,
        dtype: WireType,
        op: ReduceOp,
        stream: StreamHandle,
    ) -> devcomm::Result<()> {
        unsafe {
            nccl::all_reduce(
                send as *const c_void,
                recv as *mut c_void,
                count,
                to_nccl_dtype(dtype),
                to_nccl_op(op),
                self.comm,
                cu_stream(stream),
            )
            .map_err(nccl_call("ncclAllReduce"))?;
        }
        Ok(())
    }

    unsafe fn reduce(
        &self,
        send: u64,
        recv: u64,
        count: usize,
        dtype: WireType,
        op: ReduceOp,
        root: Rank,
        stream: StreamHandle,
    ) -> devcomm::Result<()> {
        unsafe {
            nccl::reduce(
                send as *const c_void,
                recv as *mut c_void,
                count,
                to_nccl_dtype(dtype),
                to_nccl_op(op),
                root as i32,
                self.comm,
                cu_stream(stream),
            )
            .map_err(nccl_call("ncclReduce"))?;
        }
        Ok(())
    }

    unsafe fn broadcast(
        &self,
        send: u64,
        recv: u64,
        count: usize,
        dtype: WireType,
        root: Rank,
        stream: StreamHandle,
    ) -> devcomm::Result<()> {
        unsafe {
            nccl::broadcast(
                send as *const c_void,
                recv as *mut c_void,
                count,
                to_nccl_dtype(dtype),
                root as i32,
                self.comm,
                cu_stream(stream),
            )
            .map_err(nccl_call("ncclBroadcast"))?;
        }
        Ok(())
    }

    unsafe fn reduce_scatter(
        &self,
        send: u64,
        recv: u64,
        recv_count: usize,
        dtype: WireType,
        op: ReduceOp,
        stream: StreamHandle,
    ) -> devcomm::Result<()> {
        unsafe {
            nccl::reduce_scatter(
                send as *const c_void,
                recv as *mut c_void,
                recv_count,
                to_nccl_dtype(dtype),
                to_nccl_op(op),
                self.comm,
                cu_stream(stream),
            )
            .map_err(nccl_call("ncclReduceScatter"))?;
        }
        Ok(())
    }

    unsafe fn all_gather(
        &self,
        send: u64,
        recv: u64,
        send_count: usize,
        dtype: WireType,
        stream: StreamHandle,
    ) -> devcomm::Result<()> {
        unsafe {
            nccl::all_gather(
                send as *const c_void,
                recv as *mut c_void,
                send_count,
                to_nccl_dtype(dtype),
                self.comm,
                cu_stream(stream),
            )
            .map_err(nccl_call("ncclAllGather"))?;
        }
        Ok(())
    }

    unsafe fn send(
        &self,
        ptr: u64,
        count: usize,
        dtype: WireType,
        peer: Rank,
        stream: StreamHandle,
    ) -> devcomm::Result<()> {
        unsafe {
            nccl::send(
                ptr as *const c_void,
                count,
                to_nccl_dtype(dtype),
                peer as i32,
                self.comm,
                cu_stream(stream),
            )
            .map_err(nccl_call("ncclSend"))?;
        }
        Ok(())
    }

    unsafe fn recv(
        &self,
        ptr: u64,
        count: usize,
        dtype: WireType,
        peer: Rank,
        stream: StreamHandle,
    ) -> devcomm::Result<()> {
        unsafe {
            nccl::recv(
                ptr as *mut c_void,
                count,
                to_nccl_dtype(dtype),
                peer as i32,
                self.comm,
                cu_stream(stream),
            )
            .map_err(nccl_call("ncclRecv"))?;
        }
        Ok(())
    }

    fn group_start(&self) -> devcomm::Result<()> {
        nccl::group_start().map_err(nccl_call("ncclGroupStart"))?;
        Ok(())
    }

    fn group_end(&self) -> devcomm::Result<()> {
        nccl::group_end().map_err(nccl_call("ncclGroupEnd"))?;
        Ok(())
    }

    fn current_stream(&self) -> StreamHandle {
        match &self.stream {
            Some(stream) => StreamHandle(stream.cu_stream() as u64),
            None => StreamHandle::DEFAULT,
        }
    }
}

impl Drop for NcclTransport {
    fn drop(&mut self) {
        unsafe {
            // comm_abort does not wait for outstanding work on the stream.
            if let Err(e) = nccl::comm_abort(self.comm) {
                tracing::warn!(rank = self.rank, error = ?e, "ncclCommAbort failed");
            }
        }
    }
}

/// Copy an NCCL unique id into a session identifier.
pub fn session_from_unique_id(id: &sys::ncclUniqueId) -> SessionId {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    for (b, &c) in bytes.iter_mut().zip(id.internal.iter()) {
        *b = c as u8;
    }
    SessionId::new(bytes)
}

/// Rebuild the NCCL unique id a session identifier was made from.
pub fn unique_id_from_session(session: &SessionId) -> sys::ncclUniqueId {
    let mut internal = [0 as c_char; SESSION_ID_BYTES];
    for (c, &b) in internal.iter_mut().zip(session.as_bytes().iter()) {
        *c = b as c_char;
    }
    sys::ncclUniqueId { internal }
}
