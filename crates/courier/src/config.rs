//! Client configuration, supplied at construction and immutable thereafter.

use std::time::Duration;

/// Connection and call settings for a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Server address (host or IP).
    pub addr: String,
    /// Server port.
    pub port: u16,
    /// Dial `wss://` instead of `ws://`.
    pub enable_tls: bool,
    /// Receive buffer handed to the transport.
    pub buffer_size: usize,
    /// Per-call reply window.
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: "127.0.0.1".to_string(),
            port: 22100,
            enable_tls: false,
            buffer_size: 8192,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// The `host:port` string the bootstrap starts from.
    pub fn origin(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}
