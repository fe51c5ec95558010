use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::config::BootstrapConfig;
use crate::error::{CommError, Result};
use crate::protocol::{
    StoreRequest, StoreResponse, decode_response, encode_request, read_frame, write_frame,
};
use crate::store::barrier_target;

/// A participant's handle on the rendezvous store.
///
/// Holds nothing but the address and timing knobs: every request opens
/// its own connection, so concurrent blocking lookups from one process
/// never queue behind each other and nothing is cached locally.
#[derive(Debug, Clone)]
pub struct StoreClient {
    addr: SocketAddr,
    timeout: Option<Duration>,
    connect_timeout: Duration,
    retry_interval: Duration,
}

impl StoreClient {
    /// Proxy for the store at `addr` with default timing (unbounded lookups).
    pub fn new(addr: SocketAddr) -> Self {
        let defaults = BootstrapConfig::default();
        Self {
            addr,
            timeout: defaults.store_timeout,
            connect_timeout: defaults.connect_timeout,
            retry_interval: defaults.connect_retry_interval,
        }
    }

    /// Proxy for the store described by `config`.
    pub fn from_config(config: &BootstrapConfig) -> Result<Self> {
        Ok(Self {
            addr: config.store_addr()?,
            timeout: config.store_timeout,
            connect_timeout: config.connect_timeout,
            retry_interval: config.connect_retry_interval,
        })
    }

    /// Bound every request by `timeout` (`None` = block forever).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long to keep retrying the initial connection.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Store `value` under `key`, overwriting any previous value.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let req = StoreRequest::Set {
            key: key.to_string(),
            value: value.to_vec(),
        };
        match self.request(req).await? {
            StoreResponse::Ok => Ok(()),
            other => Err(self.unexpected(key, other)),
        }
    }

    /// Block until `key` has been set, then return its value.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let req = StoreRequest::Get {
            key: key.to_string(),
        };
        match self.request(req).await? {
            StoreResponse::Value { value } => Ok(value),
            other => Err(self.unexpected(key, other)),
        }
    }

    /// Return the value under `key` without blocking; `NotFound` if absent.
    pub async fn try_get(&self, key: &str) -> Result<Vec<u8>> {
        let req = StoreRequest::TryGet {
            key: key.to_string(),
        };
        match self.request(req).await? {
            StoreResponse::Value { value } => Ok(value),
            StoreResponse::Found { present: false } => Err(CommError::NotFound {
                key: key.to_string(),
            }),
            other => Err(self.unexpected(key, other)),
        }
    }

    /// Atomically add `amount` to the counter under `key`, returning the new value.
    pub async fn add(&self, key: &str, amount: u64) -> Result<u64> {
        let req = StoreRequest::Add {
            key: key.to_string(),
            amount,
        };
        match self.request(req).await? {
            StoreResponse::Counter { value } => Ok(value),
            other => Err(self.unexpected(key, other)),
        }
    }

    /// Block until the counter under `key` has reached `target`.
    pub async fn wait_until(&self, key: &str, target: u64) -> Result<()> {
        let req = StoreRequest::WaitUntil {
            key: key.to_string(),
            target,
        };
        match self.request(req).await? {
            StoreResponse::Counter { .. } => Ok(()),
            other => Err(self.unexpected(key, other)),
        }
    }

    /// Remove `key` if present.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let req = StoreRequest::Delete {
            key: key.to_string(),
        };
        match self.request(req).await? {
            StoreResponse::Ok => Ok(()),
            other => Err(self.unexpected(key, other)),
        }
    }

    /// Whether `key` is currently set.
    pub async fn check(&self, key: &str) -> Result<bool> {
        let req = StoreRequest::Check {
            key: key.to_string(),
        };
        match self.request(req).await? {
            StoreResponse::Found { present } => Ok(present),
            other => Err(self.unexpected(key, other)),
        }
    }

    /// First half of a barrier: register arrival and return the counter
    /// value that completes this barrier generation.
    pub async fn arrive(&self, key: &str, world_size: u32) -> Result<u64> {
        let arrivals = self.add(key, 1).await?;
        let target = barrier_target(arrivals, world_size);
        tracing::debug!(key, arrivals, target, "barrier arrival");
        Ok(target)
    }

    /// Full barrier across `world_size` participants.
    pub async fn barrier(&self, key: &str, world_size: u32) -> Result<()> {
        let target = self.arrive(key, world_size).await?;
        self.wait_until(key, target).await
    }

    async fn request(&self, req: StoreRequest) -> Result<StoreResponse> {
        let key = req.key().to_string();
        let exchange = async {
            let mut stream = self.connect().await?;
            write_frame(&mut stream, &encode_request(&req)?).await?;
            let frame = read_frame(&mut stream).await?;
            decode_response(&frame)
        };

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| CommError::Timeout {
                    key,
                    timeout_ms: limit.as_millis() as u64,
                })??,
            None => exchange.await?,
        };

        match response {
            StoreResponse::Error { reason } => Err(CommError::Store {
                addr: self.addr.to_string(),
                reason,
            }),
            other => Ok(other),
        }
    }

    /// Connect to the store, retrying while the owner may still be starting.
    async fn connect(&self) -> Result<TcpStream> {
        let deadline = tokio::time::Instant::now() + self.connect_timeout;
        let mut attempts = 0u32;
        loop {
            match TcpStream::connect(self.addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) if tokio::time::Instant::now() + self.retry_interval < deadline => {
                    attempts += 1;
                    if attempts == 1 {
                        tracing::warn!(addr = %self.addr, error = %e, "store not reachable yet, retrying");
                    }
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => {
                    return Err(CommError::Bootstrap {
                        reason: format!(
                            "could not reach store at {} after {attempts} retries: {e}",
                            self.addr
                        ),
                    });
                }
            }
        }
    }

    fn unexpected(&self, key: &str, response: StoreResponse) -> CommError {
        CommError::Store {
            addr: self.addr.to_string(),
            reason: format!("unexpected response for {key:?}: {response:?}"),
        }
    }
}
