use devcomm::{
    BootstrapConfig, Communicator, GroupConfig, LoopbackFabric, LoopbackProvider,
    LoopbackTransport, Rank, ReduceOp, Result, SESSION_ID_BYTES, SessionId, StreamHandle,
    Transport, TransportProvider, WireType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Route library logs to the test output; `RUST_LOG=devcomm=debug` shows store traffic.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A port nobody is listening on right now.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn test_config(port: u16) -> BootstrapConfig {
    BootstrapConfig::new("127.0.0.1", port).with_store_timeout(Duration::from_secs(30))
}

/// Run `f` on every rank of a loopback group, one OS thread per rank.
///
/// Communicators are kept alive until every rank has returned, so rank 0's
/// store outlives everyone's last request. Results come back in rank order.
pub fn run_ranks<R, F>(world_size: u32, f: F) -> Vec<R>
where
    F: Fn(&mut Communicator<LoopbackTransport>) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    init_tracing();
    let config = test_config(free_port());
    let provider = LoopbackProvider::new(Arc::new(LoopbackFabric::with_recv_timeout(Some(
        Duration::from_secs(30),
    ))));
    let f = Arc::new(f);
    let done = Arc::new(Barrier::new(world_size as usize));

    let handles: Vec<_> = (0..world_size)
        .map(|rank| {
            let config = config.clone();
            let provider = provider.clone();
            let f = Arc::clone(&f);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let group = GroupConfig::new(world_size, rank).unwrap();
                let mut comm = Communicator::init(&provider, group, &config).unwrap();
                let result = f(&mut comm);
                done.wait();
                drop(comm);
                result
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

/// Provider whose transports only count calls.
#[derive(Clone, Default)]
pub struct CountingProvider {
    pub calls: Arc<AtomicUsize>,
}

impl CountingProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TransportProvider for CountingProvider {
    type Transport = CountingTransport;

    fn unique_id(&self) -> Result<SessionId> {
        Ok(SessionId::new([7; SESSION_ID_BYTES]))
    }

    fn init(&self, _world_size: u32, _session: &SessionId, _rank: Rank) -> Result<CountingTransport> {
        Ok(CountingTransport {
            calls: Arc::clone(&self.calls),
        })
    }
}

pub struct CountingTransport {
    calls: Arc<AtomicUsize>,
}

impl CountingTransport {
    fn hit(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Transport for CountingTransport {
    unsafe fn all_reduce(&self, _: u64, _: u64, _: usize, _: WireType, _: ReduceOp, _: StreamHandle) -> Result<()> {
        self.hit()
    }

    unsafe fn reduce(
        &self,
        _: u64,
        _: u64,
        _: usize,
        _: WireType,
        _: ReduceOp,
        _: Rank,
        _: StreamHandle,
    ) -> Result<()> {
        self.hit()
    }

    unsafe fn broadcast(&self, _: u64, _: u64, _: usize, _: WireType, _: Rank, _: StreamHandle) -> Result<()> {
        self.hit()
    }

    unsafe fn reduce_scatter(&self, _: u64, _: u64, _: usize, _: WireType, _: ReduceOp, _: StreamHandle) -> Result<()> {
        self.hit()
    }

    unsafe fn all_gather(&self, _: u64, _: u64, _: usize, _: WireType, _: StreamHandle) -> Result<()> {
        self.hit()
    }

    unsafe fn send(&self, _: u64, _: usize, _: WireType, _: Rank, _: StreamHandle) -> Result<()> {
        self.hit()
    }

    unsafe fn recv(&self, _: u64, _: usize, _: WireType, _: Rank, _: StreamHandle) -> Result<()> {
        self.hit()
    }

    fn group_start(&self) -> Result<()> {
        self.hit()
    }

    fn group_end(&self) -> Result<()> {
        self.hit()
    }
}
