//! Bootstrap configuration for the rendezvous store.
//!
//! All values have defaults. Override via environment variables
//! (prefixed `DEVCOMM_`) or by constructing a custom `BootstrapConfig`.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::error::{CommError, Result};

/// Host used when no configuration is supplied.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when no configuration is supplied.
pub const DEFAULT_PORT: u16 = 12345;

/// Where the rendezvous store lives and how long to wait on it.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Host the store owner binds and participants connect to.
    pub host: String,

    /// Port of the store.
    pub port: u16,

    /// Bound on blocking store lookups (`get`, `wait_until`, barriers).
    ///
    /// `None` blocks forever: a rank whose peer never publishes hangs.
    pub store_timeout: Option<Duration>,

    /// How long a participant keeps retrying to reach the store before
    /// giving up. Participants may start before the owner has bound.
    pub connect_timeout: Duration,

    /// Delay between connection attempts.
    pub connect_retry_interval: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            store_timeout: None,
            connect_timeout: Duration::from_secs(60),
            connect_retry_interval: Duration::from_millis(100),
        }
    }
}

impl BootstrapConfig {
    /// Config for a store at `host:port` with default timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set a bound on blocking store lookups.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `DEVCOMM_HOST`
    /// - `DEVCOMM_PORT`
    /// - `DEVCOMM_STORE_TIMEOUT_SECS`
    /// - `DEVCOMM_CONNECT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("DEVCOMM_HOST") {
            if !v.is_empty() {
                cfg.host = v;
            }
        }
        if let Some(v) = lookup("DEVCOMM_PORT") {
            if let Ok(p) = v.parse::<u16>() {
                cfg.port = p;
            }
        }
        if let Some(v) = lookup("DEVCOMM_STORE_TIMEOUT_SECS") {
            if let Ok(s) = v.parse::<u64>() {
                cfg.store_timeout = Some(Duration::from_secs(s));
            }
        }
        if let Some(v) = lookup("DEVCOMM_CONNECT_TIMEOUT_SECS") {
            if let Ok(s) = v.parse::<u64>() {
                cfg.connect_timeout = Duration::from_secs(s);
            }
        }

        cfg
    }

    /// Resolve `host:port` to a socket address.
    pub fn store_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| CommError::Bootstrap {
                reason: format!("could not resolve store host {}:{}", self.host, self.port),
            })
    }
}
