use std::sync::atomic::{AtomicU64, Ordering};

use crate::buffer::BufferView;
use crate::collective::{self, Batch};
use crate::config::BootstrapConfig;
use crate::error::Result;
use crate::session::bootstrap_session;
use crate::store::{StoreClient, StoreServer};
use crate::transport::{Transport, TransportProvider};
use crate::types::{GroupConfig, Rank, ReduceOp, StreamHandle};

/// What a process does with the rendezvous store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    /// Host the store and use it as a participant.
    Owner,
    /// Use a store hosted elsewhere.
    Participant,
}

impl StoreRole {
    /// Rank 0 owns the store; everyone else participates.
    pub fn for_rank(rank: Rank) -> Self {
        if rank == 0 {
            StoreRole::Owner
        } else {
            StoreRole::Participant
        }
    }
}

/// A process's handle on its group.
///
/// Owns the transport handle, a store proxy, the store itself when this
/// process is the owner, and a tokio runtime driving all store traffic.
/// Every method blocks the calling thread; data-moving operations only
/// enqueue work on the stream and return.
///
/// Not meant for concurrent use: the `&mut self` on [`batch`] keeps other
/// calls out of an open group, anything else needs external locking.
/// Do not drop a `Communicator` from inside an async context, since it
/// shuts down its runtime.
///
/// [`batch`]: Communicator::batch
pub struct Communicator<T: Transport> {
    transport: T,
    group: GroupConfig,
    store: StoreClient,
    broadcast_seq: AtomicU64,
    _server: Option<StoreServer>,
    rt: tokio::runtime::Runtime,
}

impl<T: Transport> Communicator<T> {
    /// Bootstrap and build the communicator for `group`, owning the store on rank 0.
    ///
    /// Every rank of the group must call this; it returns once the session
    /// is agreed and the transport is up on this rank.
    pub fn init<P>(provider: &P, group: GroupConfig, config: &BootstrapConfig) -> Result<Self>
    where
        P: TransportProvider<Transport = T>,
    {
        Self::init_with_role(provider, group, config, StoreRole::for_rank(group.rank()))
    }

    /// Like [`init`](Self::init) with an explicit store role.
    ///
    /// Exactly one process must be the owner, and it must be reachable
    /// before the other ranks' connect timeout runs out.
    pub fn init_with_role<P>(
        provider: &P,
        group: GroupConfig,
        config: &BootstrapConfig,
        role: StoreRole,
    ) -> Result<Self>
    where
        P: TransportProvider<Transport = T>,
    {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("devcomm-store")
            .enable_all()
            .build()?;

        let server = match role {
            StoreRole::Owner => Some(rt.block_on(StoreServer::bind(config.store_addr()?))?),
            StoreRole::Participant => None,
        };
        let store = StoreClient::from_config(config)?;

        let session = rt.block_on(bootstrap_session(&store, group, provider))?;
        let transport = provider.init(group.world_size(), &session, group.rank())?;

        tracing::info!(
            rank = group.rank(),
            world_size = group.world_size(),
            owner = server.is_some(),
            "communicator ready"
        );

        Ok(Self {
            transport,
            group,
            store,
            broadcast_seq: AtomicU64::new(0),
            _server: server,
            rt,
        })
    }

    pub fn rank(&self) -> Rank {
        self.group.rank()
    }

    pub fn world_size(&self) -> u32 {
        self.group.world_size()
    }

    pub fn group(&self) -> GroupConfig {
        self.group
    }

    /// Proxy to the group's rendezvous store.
    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn stream(&self, stream: Option<StreamHandle>) -> StreamHandle {
        stream.unwrap_or_else(|| self.transport.current_stream())
    }

    /// Element-wise reduction of `input` across all ranks into every rank's `output`.
    ///
    /// # Safety
    /// Both views must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn all_reduce(
        &self,
        input: &BufferView,
        output: &BufferView,
        op: ReduceOp,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::all_reduce(&self.transport, input, output, op, stream) }
    }

    /// Reduction of `input` across all ranks into `root`'s `output`.
    ///
    /// # Safety
    /// `input`, and `output` on `root`, must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn reduce(
        &self,
        input: &BufferView,
        output: &BufferView,
        root: Rank,
        op: ReduceOp,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::reduce(&self.transport, self.group, input, output, root, op, stream) }
    }

    /// Copy `root`'s `buffer` into every other rank's `buffer`.
    ///
    /// # Safety
    /// `buffer` must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn broadcast(
        &self,
        buffer: &BufferView,
        root: Rank,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::broadcast(&self.transport, self.group, buffer, root, stream) }
    }

    /// # Safety
    /// Both views must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn reduce_scatter(
        &self,
        input: &BufferView,
        output: &BufferView,
        op: ReduceOp,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::reduce_scatter(&self.transport, self.group, input, output, op, stream) }
    }

    /// # Safety
    /// Both views must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn all_gather(
        &self,
        input: &BufferView,
        output: &BufferView,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::all_gather(&self.transport, self.group, input, output, stream) }
    }

    /// Send `buffer` to `peer`. Sending to oneself outside a batch deadlocks
    /// on transports that block until the receive is posted.
    ///
    /// # Safety
    /// `buffer` must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn send(
        &self,
        buffer: &BufferView,
        peer: Rank,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::send(&self.transport, self.group, buffer, peer, stream) }
    }

    /// # Safety
    /// `buffer` must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn recv(
        &self,
        buffer: &BufferView,
        peer: Rank,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::recv(&self.transport, self.group, buffer, peer, stream) }
    }

    /// Exchange buffers with `peer` as one grouped operation.
    ///
    /// # Safety
    /// Both views must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn send_recv(
        &self,
        input: &BufferView,
        output: &BufferView,
        peer: Rank,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::send_recv(&self.transport, self.group, input, output, peer, stream) }
    }

    /// # Safety
    /// `output`, and `input` on `root`, must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn scatter(
        &self,
        input: &BufferView,
        output: &BufferView,
        root: Rank,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::scatter(&self.transport, self.group, input, output, root, stream) }
    }

    /// # Safety
    /// `input`, and `output` on `root`, must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn gather(
        &self,
        input: &BufferView,
        output: &BufferView,
        root: Rank,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::gather(&self.transport, self.group, input, output, root, stream) }
    }

    /// # Safety
    /// Both views must satisfy [`BufferView::from_raw`]'s contract.
    pub unsafe fn all_to_all(
        &self,
        input: &BufferView,
        output: &BufferView,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        let stream = self.stream(stream);
        unsafe { collective::all_to_all(&self.transport, self.group, input, output, stream) }
    }

    /// Open a group of point-to-point calls on `stream`.
    pub fn batch(&mut self, stream: Option<StreamHandle>) -> Result<Batch<'_, T>> {
        let stream = self.stream(stream);
        Batch::open(&self.transport, self.group, stream)
    }

    /// Block until every rank has reached this barrier. Never touches the transport.
    pub fn cpu_barrier(&self) -> Result<()> {
        self.rt
            .block_on(collective::cpu_barrier(&self.store, self.group))
    }

    /// Broadcast a small host value from `root` through the store.
    ///
    /// `value` is ignored on other ranks. All ranks must issue host
    /// broadcasts in the same order.
    pub fn cpu_broadcast(&self, value: &[u8], root: Rank) -> Result<Vec<u8>> {
        self.group.check_rank(root)?;
        let seq = self.broadcast_seq.fetch_add(1, Ordering::Relaxed);
        self.rt.block_on(collective::cpu_broadcast(
            &self.store,
            self.group,
            seq,
            value,
            root,
        ))
    }
}
