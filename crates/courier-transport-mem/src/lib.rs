//! courier-transport-mem: In-process transport for courier.
//!
//! This is the semantic reference implementation: other transports must
//! behave identically at the [`Transport`] seam. Messages cross a pair of
//! bounded queues with no serialization beyond the envelope bytes, which
//! makes it the substrate for channel and client behavior tests.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use courier_core::{ConnState, Error, Result, Transport};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

/// Queue depth for each direction of a pair.
const QUEUE_DEPTH: usize = 64;

/// One end of an in-process connection.
pub struct MemTransport {
    /// Outbound sender; taken on close so the peer observes end-of-stream.
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl MemTransport {
    /// Create a connected pair of transports.
    pub fn pair() -> (MemTransport, MemTransport) {
        let (a_tx, b_rx) = mpsc::channel(QUEUE_DEPTH);
        let (b_tx, a_rx) = mpsc::channel(QUEUE_DEPTH);
        (Self::end(a_tx, a_rx), Self::end(b_tx, b_rx))
    }

    fn end(tx: mpsc::Sender<Vec<u8>>, rx: mpsc::Receiver<Vec<u8>>) -> MemTransport {
        MemTransport {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    /// Whether this end has been closed locally.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Transport for MemTransport {
    fn state(&self) -> ConnState {
        if self.is_closed() {
            ConnState::Closed
        } else {
            ConnState::Open
        }
    }

    async fn send(&self, data: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::NotConnected);
        }
        let tx = self.tx.lock().clone().ok_or(Error::NotConnected)?;
        // Peer receiver dropped: the connection is gone.
        tx.send(data).await.map_err(|_| Error::Closed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>> {
        if self.is_closed() {
            return Ok(None);
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(data) => Ok(Some(data)),
                // Peer sender dropped: this end is closed too.
                None => {
                    self.closed.store(true, Ordering::Release);
                    Ok(None)
                }
            },
            _ = self.close_signal.notified() => Ok(None),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        // Dropping the sender ends the peer's stream.
        self.tx.lock().take();
        // Stored permit wakes a recv that is already blocked.
        self.close_signal.notify_one();
        Ok(())
    }
}
