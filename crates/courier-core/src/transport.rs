//! Transport seams.
//!
//! The core only needs send/receive/state primitives from the physical
//! connection; handshakes, TLS, and message framing live behind these traits.

use std::future::Future;

use crate::error::Result;

/// Connection lifecycle state as observed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// A persistent bidirectional message stream.
///
/// `recv` yields one complete application message at a time; transports are
/// responsible for reassembling fragments. `Ok(None)` signals a graceful
/// close. Sending on a transport that is not open fails with
/// [`crate::Error::NotConnected`].
pub trait Transport: Send + Sync + 'static {
    /// Current connection state.
    fn state(&self) -> ConnState;

    /// Whether the connection is open for sending.
    fn is_open(&self) -> bool {
        matches!(self.state(), ConnState::Open)
    }

    /// Send one complete message.
    fn send(&self, data: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    /// Receive one complete message, or `None` when the connection closes.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Close the connection.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Which logical channel a connection serves.
///
/// The two lanes are fully independent; they typically map to distinct
/// endpoint paths on the same host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Control channel, used for the bootstrap handshake.
    System,
    /// Data channel carrying application traffic.
    User,
}

impl Lane {
    pub fn as_str(self) -> &'static str {
        match self {
            Lane::System => "system",
            Lane::User => "user",
        }
    }
}

/// Factory that opens a transport to `addr` for the given lane.
///
/// The orchestrator calls this once per channel, and again for the system
/// lane on each bootstrap redirection hop.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    fn connect(
        &self,
        addr: &str,
        lane: Lane,
    ) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Inert transport for unit tests that never touch the wire.
#[cfg(test)]
pub(crate) struct NullTransport;

#[cfg(test)]
impl Transport for NullTransport {
    fn state(&self) -> ConnState {
        ConnState::Closed
    }

    async fn send(&self, _data: Vec<u8>) -> Result<()> {
        Err(crate::Error::NotConnected)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
