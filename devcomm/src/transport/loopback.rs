//! In-process transport over host memory.
//!
//! Every rank is a thread of the same process and every pointer is a host
//! pointer. Messages travel through per-(source, destination) mailboxes on
//! a shared [`LoopbackFabric`], so sends never block and receives block
//! until the matching send has been posted. Work executes synchronously;
//! the stream argument is accepted and ignored.
//!
//! Useful for tests and for CPU-only runs of code written against the
//! device API.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hasher};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error::{CommError, Result};
use crate::reduce::reduce_slice;
use crate::session::{SESSION_ID_BYTES, SessionId};
use crate::transport::{Transport, TransportProvider};
use crate::types::{Rank, ReduceOp, StreamHandle, WireType};

/// Default bound on a blocking receive before the fabric reports a failure.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    PointToPoint,
    Collective,
}

type MailboxKey = (Rank, Rank, Channel);

#[derive(Default)]
struct FabricState {
    session: Option<SessionId>,
    world_size: u32,
    joined: HashSet<Rank>,
    mailboxes: HashMap<MailboxKey, VecDeque<Vec<u8>>>,
}

/// Shared medium connecting the loopback ranks of one group.
pub struct LoopbackFabric {
    state: Mutex<FabricState>,
    changed: Condvar,
    recv_timeout: Option<Duration>,
}

impl Default for LoopbackFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackFabric {
    /// Fabric whose receives fail after [`DEFAULT_RECV_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_recv_timeout(Some(DEFAULT_RECV_TIMEOUT))
    }

    /// Fabric with an explicit receive bound (`None` = wait forever).
    pub fn with_recv_timeout(recv_timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(FabricState::default()),
            changed: Condvar::new(),
            recv_timeout,
        }
    }

    /// Number of messages posted but not yet received.
    pub fn in_flight(&self) -> usize {
        self.lock().mailboxes.values().map(VecDeque::len).sum()
    }

    fn lock(&self) -> MutexGuard<'_, FabricState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `rank` and wait for the rest of the group.
    fn join(&self, world_size: u32, session: &SessionId, rank: Rank) -> Result<()> {
        let mut st = self.lock();
        match &st.session {
            None => {
                st.session = Some(session.clone());
                st.world_size = world_size;
            }
            Some(existing) if existing != session => {
                return Err(CommError::transport(format!(
                    "rank {rank} joined with session {session:?}, group uses {existing:?}"
                )));
            }
            Some(_) if st.world_size != world_size => {
                return Err(CommError::transport(format!(
                    "rank {rank} joined with world size {world_size}, group uses {}",
                    st.world_size
                )));
            }
            Some(_) => {}
        }
        if !st.joined.insert(rank) {
            return Err(CommError::transport(format!("rank {rank} joined twice")));
        }
        self.changed.notify_all();

        let deadline = self.recv_timeout.map(|t| Instant::now() + t);
        while (st.joined.len() as u32) < world_size {
            st = self.wait(st, deadline).map_err(|_| {
                CommError::transport(format!(
                    "rank {rank} timed out waiting for the group to form"
                ))
            })?;
        }
        Ok(())
    }

    fn post(&self, src: Rank, dst: Rank, channel: Channel, data: Vec<u8>) {
        self.lock()
            .mailboxes
            .entry((src, dst, channel))
            .or_default()
            .push_back(data);
        self.changed.notify_all();
    }

    /// Block until a message from `src` to `dst` is available and take it.
    fn take(&self, src: Rank, dst: Rank, channel: Channel, expected_len: usize) -> Result<Vec<u8>> {
        let deadline = self.recv_timeout.map(|t| Instant::now() + t);
        let mut st = self.lock();
        loop {
            if let Some(data) = st
                .mailboxes
                .get_mut(&(src, dst, channel))
                .and_then(VecDeque::pop_front)
            {
                if data.len() != expected_len {
                    return Err(CommError::transport(format!(
                        "rank {dst} expected {expected_len} bytes from rank {src}, got {}",
                        data.len()
                    )));
                }
                return Ok(data);
            }
            st = self.wait(st, deadline).map_err(|_| {
                CommError::transport(format!(
                    "rank {dst} timed out waiting for data from rank {src}"
                ))
            })?;
        }
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, FabricState>,
        deadline: Option<Instant>,
    ) -> std::result::Result<MutexGuard<'a, FabricState>, ()> {
        match deadline {
            None => Ok(self
                .changed
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner())),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(());
                }
                let (guard, _) = self
                    .changed
                    .wait_timeout(guard, deadline - now)
                    .unwrap_or_else(|e| e.into_inner());
                Ok(guard)
            }
        }
    }
}

/// Creates [`LoopbackTransport`]s attached to one fabric.
#[derive(Clone)]
pub struct LoopbackProvider {
    fabric: Arc<LoopbackFabric>,
}

impl LoopbackProvider {
    pub fn new(fabric: Arc<LoopbackFabric>) -> Self {
        Self { fabric }
    }

    pub fn fabric(&self) -> &Arc<LoopbackFabric> {
        &self.fabric
    }
}

impl TransportProvider for LoopbackProvider {
    type Transport = LoopbackTransport;

    fn unique_id(&self) -> Result<SessionId> {
        Ok(random_session_id())
    }

    fn init(&self, world_size: u32, session: &SessionId, rank: Rank) -> Result<LoopbackTransport> {
        self.fabric.join(world_size, session, rank)?;
        Ok(LoopbackTransport {
            fabric: Arc::clone(&self.fabric),
            rank,
            world_size,
            group: Mutex::new(GroupState::default()),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum PendingOp {
    Send { ptr: u64, bytes: usize, peer: Rank },
    Recv { ptr: u64, bytes: usize, peer: Rank },
}

#[derive(Default)]
struct GroupState {
    depth: u32,
    pending: Vec<PendingOp>,
}

/// One rank's handle on a [`LoopbackFabric`].
pub struct LoopbackTransport {
    fabric: Arc<LoopbackFabric>,
    rank: Rank,
    world_size: u32,
    group: Mutex<GroupState>,
}

impl LoopbackTransport {
    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    fn group(&self) -> MutexGuard<'_, GroupState> {
        self.group.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_peer(&self, peer: Rank) -> Result<()> {
        if peer >= self.world_size {
            return Err(CommError::transport(format!(
                "peer {peer} out of range for group of {}",
                self.world_size
            )));
        }
        Ok(())
    }

    /// Defer `op` if a group is open, otherwise run it now.
    unsafe fn issue(&self, op: PendingOp) -> Result<()> {
        {
            let mut group = self.group();
            if group.depth > 0 {
                group.pending.push(op);
                return Ok(());
            }
        }
        unsafe { self.execute(op) }
    }

    unsafe fn execute(&self, op: PendingOp) -> Result<()> {
        match op {
            PendingOp::Send { ptr, bytes, peer } => {
                let data = unsafe { read_host(ptr, bytes) };
                self.fabric
                    .post(self.rank, peer, Channel::PointToPoint, data);
            }
            PendingOp::Recv { ptr, bytes, peer } => {
                let data = self
                    .fabric
                    .take(peer, self.rank, Channel::PointToPoint, bytes)?;
                unsafe { write_host(ptr, &data) };
            }
        }
        Ok(())
    }

    fn post_all(&self, data: &[u8]) {
        for dst in 0..self.world_size {
            self.fabric
                .post(self.rank, dst, Channel::Collective, data.to_vec());
        }
    }

    /// Receive one contribution from every rank and fold them in rank order.
    fn fold_all(&self, bytes: usize, dtype: WireType, op: ReduceOp) -> Result<Vec<u8>> {
        let mut acc = self.fabric.take(0, self.rank, Channel::Collective, bytes)?;
        for src in 1..self.world_size {
            let contrib = self
                .fabric
                .take(src, self.rank, Channel::Collective, bytes)?;
            reduce_slice(&mut acc, &contrib, dtype, op);
        }
        Ok(acc)
    }
}

impl Transport for LoopbackTransport {
    unsafe fn all_reduce(
        &self,
        send: u64,
        recv: u64,
        count: usize,
        dtype: WireType,
        op: ReduceOp,
        _stream: StreamHandle,
    ) -> Result<()> {
        let bytes = count * dtype.size_in_bytes();
        self.post_all(&unsafe { read_host(send, bytes) });
        let acc = self.fold_all(bytes, dtype, op)?;
        unsafe { write_host(recv, &acc) };
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
        _stream: StreamHandle,
    ) -> Result<()> {
        self.check_peer(root)?;
        let bytes = count * dtype.size_in_bytes();
        let data = unsafe { read_host(send, bytes) };
        self.fabric.post(self.rank, root, Channel::Collective, data);
        if self.rank == root {
            let acc = self.fold_all(bytes, dtype, op)?;
            unsafe { write_host(recv, &acc) };
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
        _stream: StreamHandle,
    ) -> Result<()> {
        self.check_peer(root)?;
        let bytes = count * dtype.size_in_bytes();
        if self.rank == root {
            let data = unsafe { read_host(send, bytes) };
            for dst in (0..self.world_size).filter(|&r| r != root) {
                self.fabric
                    .post(self.rank, dst, Channel::Collective, data.clone());
            }
            if send != recv {
                unsafe { write_host(recv, &data) };
            }
        } else {
            let data = self.fabric.take(root, self.rank, Channel::Collective, bytes)?;
            unsafe { write_host(recv, &data) };
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
        _stream: StreamHandle,
    ) -> Result<()> {
        let chunk = recv_count * dtype.size_in_bytes();
        let data = unsafe { read_host(send, chunk * self.world_size as usize) };
        for dst in 0..self.world_size {
            let start = dst as usize * chunk;
            self.fabric.post(
                self.rank,
                dst,
                Channel::Collective,
                data[start..start + chunk].to_vec(),
            );
        }
        let acc = self.fold_all(chunk, dtype, op)?;
        unsafe { write_host(recv, &acc) };
        Ok(())
    }

    unsafe fn all_gather(
        &self,
        send: u64,
        recv: u64,
        send_count: usize,
        dtype: WireType,
        _stream: StreamHandle,
    ) -> Result<()> {
        let bytes = send_count * dtype.size_in_bytes();
        self.post_all(&unsafe { read_host(send, bytes) });
        for src in 0..self.world_size {
            let data = self.fabric.take(src, self.rank, Channel::Collective, bytes)?;
            unsafe { write_host(recv + (src as usize * bytes) as u64, &data) };
        }
        Ok(())
    }

    unsafe fn send(
        &self,
        ptr: u64,
        count: usize,
        dtype: WireType,
        peer: Rank,
        _stream: StreamHandle,
    ) -> Result<()> {
        self.check_peer(peer)?;
        let bytes = count * dtype.size_in_bytes();
        unsafe { self.issue(PendingOp::Send { ptr, bytes, peer }) }
    }

    unsafe fn recv(
        &self,
        ptr: u64,
        count: usize,
        dtype: WireType,
        peer: Rank,
        _stream: StreamHandle,
    ) -> Result<()> {
        self.check_peer(peer)?;
        let bytes = count * dtype.size_in_bytes();
        unsafe { self.issue(PendingOp::Recv { ptr, bytes, peer }) }
    }

    fn group_start(&self) -> Result<()> {
        self.group().depth += 1;
        Ok(())
    }

    fn group_end(&self) -> Result<()> {
        let pending = {
            let mut group = self.group();
            if group.depth == 0 {
                return Err(CommError::transport("group_end without group_start"));
            }
            group.depth -= 1;
            if group.depth > 0 {
                return Ok(());
            }
            std::mem::take(&mut group.pending)
        };

        // Sends are buffered, so posting all of them before any receive
        // makes the exchange deadlock-free regardless of issue order.
        let (sends, recvs): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|op| matches!(op, PendingOp::Send { .. }));
        for op in sends.into_iter().chain(recvs) {
            // SAFETY: pointers were supplied to `send`/`recv`, whose callers
            // guaranteed validity until the group completes.
            unsafe { self.execute(op)? };
        }
        Ok(())
    }
}

/// Copy `len` bytes out of host memory.
///
/// # Safety
/// `ptr` must be valid for reads of `len` bytes.
unsafe fn read_host(ptr: u64, len: usize) -> Vec<u8> {
    if len == 0 {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(ptr as *const u8, len) }.to_vec()
}

/// Copy `data` into host memory.
///
/// # Safety
/// `ptr` must be valid for writes of `data.len()` bytes.
unsafe fn write_host(ptr: u64, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len()) };
}

/// Fresh identifier from the process's randomly keyed hasher and the clock.
fn random_session_id() -> SessionId {
    let keys = std::collections::hash_map::RandomState::new();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut bytes = [0u8; SESSION_ID_BYTES];
    for (i, chunk) in bytes.chunks_exact_mut(8).enumerate() {
        let mut h = keys.build_hasher();
        h.write_u128(nanos);
        h.write_usize(i);
        chunk.copy_from_slice(&h.finish().to_le_bytes());
    }
    SessionId::new(bytes)
}
