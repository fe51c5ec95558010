use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{CommError, Result};
use crate::protocol::{
    StoreRequest, StoreResponse, decode_request, encode_response, read_frame, write_frame,
};
use crate::store::{decode_counter, encode_counter};

/// The store owner: binds the listener and serves store requests.
///
/// Each accepted connection is served on its own task, so a participant
/// blocked in `Get` or `WaitUntil` never stalls anyone else. Dropping the
/// server aborts the accept loop together with every connection task and
/// releases the listening socket.
pub struct StoreServer {
    local_addr: SocketAddr,
    state: Arc<StoreState>,
    accept_task: JoinHandle<()>,
}

struct StoreState {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    /// Woken on every mutation; blocked lookups re-check their condition.
    changed: Notify,
    requests: AtomicU64,
    connections: AtomicUsize,
}

impl StoreState {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            changed: Notify::new(),
            requests: AtomicU64::new(0),
            connections: AtomicUsize::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // Critical sections never panic mid-update, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StoreServer {
    /// Bind the store listener and start serving on the current runtime.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(StoreState::new());
        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(accept_loop(listener, accept_state));

        tracing::info!(%local_addr, "rendezvous store listening");
        Ok(Self {
            local_addr,
            state,
            accept_task,
        })
    }

    /// The address the store is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.state.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests received since the server started.
    pub fn requests_served(&self) -> u64 {
        self.state.requests.load(Ordering::Relaxed)
    }

    /// Number of participant connections currently being served.
    pub fn open_connections(&self) -> usize {
        self.state.connections.load(Ordering::Relaxed)
    }
}

impl Drop for StoreServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<StoreState>) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&state);
                    state.connections.fetch_add(1, Ordering::Relaxed);
                    connections.spawn(async move {
                        if let Err(e) = serve_connection(stream, &state).await {
                            tracing::debug!(%peer, error = %e, "store connection closed with error");
                        }
                        state.connections.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                Err(e) => tracing::warn!(error = %e, "store accept failed"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn serve_connection(mut stream: TcpStream, state: &StoreState) -> Result<()> {
    stream.set_nodelay(true)?;
    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(CommError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let request = decode_request(&frame)?;
        state.requests.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = request.key(), "store request: {request:?}");

        let response = tokio::select! {
            response = handle_request(state, request) => response,
            _ = peer_closed(&stream) => {
                tracing::debug!("store participant hung up on a pending request");
                return Ok(());
            }
        };
        write_frame(&mut stream, &encode_response(&response)?).await?;
    }
}

/// Resolves once the participant closes its end of the connection.
///
/// A participant sends one request and then only reads, so readable bytes
/// here mean either EOF or a pipelined request, which stays queued.
async fn peer_closed(stream: &TcpStream) {
    let mut byte = [0u8; 1];
    match stream.peek(&mut byte).await {
        Ok(0) | Err(_) => {}
        Ok(_) => std::future::pending().await,
    }
}

async fn handle_request(state: &StoreState, request: StoreRequest) -> StoreResponse {
    match request {
        StoreRequest::Set { key, value } => {
            state.entries().insert(key, value);
            state.changed.notify_waiters();
            StoreResponse::Ok
        }
        StoreRequest::Get { key } => loop {
            let mut notified = std::pin::pin!(state.changed.notified());
            notified.as_mut().enable();
            if let Some(value) = state.entries().get(&key) {
                return StoreResponse::Value {
                    value: value.clone(),
                };
            }
            notified.await;
        },
        StoreRequest::Add { key, amount } => {
            let response = {
                let mut entries = state.entries();
                let current = match entries.get(&key).map(|v| decode_counter(&key, v)) {
                    Some(Ok(v)) => v,
                    Some(Err(e)) => {
                        return StoreResponse::Error {
                            reason: e.to_string(),
                        };
                    }
                    None => 0,
                };
                let value = current.saturating_add(amount);
                entries.insert(key, encode_counter(value).to_vec());
                StoreResponse::Counter { value }
            };
            state.changed.notify_waiters();
            response
        }
        StoreRequest::WaitUntil { key, target } => loop {
            let mut notified = std::pin::pin!(state.changed.notified());
            notified.as_mut().enable();
            {
                let entries = state.entries();
                match entries.get(&key).map(|v| decode_counter(&key, v)) {
                    Some(Ok(v)) if v >= target => return StoreResponse::Counter { value: v },
                    Some(Err(e)) => {
                        return StoreResponse::Error {
                            reason: e.to_string(),
                        };
                    }
                    _ => {}
                }
            }
            notified.await;
        },
        StoreRequest::Delete { key } => {
            state.entries().remove(&key);
            state.changed.notify_waiters();
            StoreResponse::Ok
        }
        StoreRequest::Check { key } => StoreResponse::Found {
            present: state.entries().contains_key(&key),
        },
        StoreRequest::TryGet { key } => match state.entries().get(&key) {
            Some(value) => StoreResponse::Value {
                value: value.clone(),
            },
            None => StoreResponse::Found { present: false },
        },
    }
}
