//! Pending-call table: correlation ids mapped to one-shot continuations.
//!
//! Entries are created at request send time and removed exactly once, either
//! by a matching reply arrival or by the caller's timeout. Removal is an
//! atomic check-and-remove under one lock, so the race between timeout and
//! arrival resolves to whichever wins; the loser finds no entry and that is
//! not an error.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// The raw outcome of a call, as delivered by the read loop.
#[derive(Debug)]
pub struct Reply {
    pub data: String,
    pub success: bool,
}

struct PendingCall {
    tx: oneshot::Sender<Reply>,
    created_at: Instant,
}

/// Table of in-flight calls, keyed by correlation id.
///
/// Owned exclusively by the channel that issued the calls. Safe for
/// concurrent insert and atomic-remove from many callers plus the read loop.
#[derive(Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<String, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id` and return the receiving end.
    pub fn register(&self, id: &str) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        let call = PendingCall {
            tx,
            created_at: Instant::now(),
        };
        self.calls.lock().insert(id.to_string(), call);
        rx
    }

    /// Atomically remove the waiter for `id` and deliver `reply` to it.
    ///
    /// Returns `false` when no entry matched (already timed out, or a
    /// duplicate reply); the reply is dropped in that case.
    pub fn complete(&self, id: &str, reply: Reply) -> bool {
        let call = self.calls.lock().remove(id);
        match call {
            Some(call) => {
                debug!(
                    id,
                    elapsed_ms = call.created_at.elapsed().as_millis() as u64,
                    "reply correlated"
                );
                // The receiver may have been dropped in the instant after the
                // timeout lost the remove race; that delivery failure is benign.
                let _ = call.tx.send(reply);
                true
            }
            None => false,
        }
    }

    /// Remove the waiter for `id` without firing it (timeout expiry path).
    ///
    /// Returns `false` when the reply already won the race.
    pub fn discard(&self, id: &str) -> bool {
        self.calls.lock().remove(id).is_some()
    }

    /// Drop every waiter, waking all callers with a closed-channel error.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Number of in-flight calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}
