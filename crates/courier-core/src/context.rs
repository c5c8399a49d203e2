//! Per-inbound-message scratch state.
//!
//! A fresh context is created for each inbound message, mutated by the
//! middleware chain, read by the route handler, and dropped when dispatch
//! finishes. It is never persisted across messages.

use std::any::Any;
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::channel::Channel;
use crate::transport::Transport;

/// Key/value bag with typed retrieval, plus a handle to the owning channel.
pub struct Context<T: Transport> {
    channel: Channel<T>,
    values: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl<T: Transport> Context<T> {
    pub(crate) fn new(channel: Channel<T>) -> Self {
        Context {
            channel,
            values: Mutex::new(HashMap::new()),
        }
    }

    /// The channel this message arrived on. Handlers can clone it to issue
    /// pushes from a spawned task.
    pub fn channel(&self) -> &Channel<T> {
        &self.channel
    }

    /// Store a value under `key`, overwriting any previous value.
    pub fn set<V: Send + Sync + 'static>(&self, key: impl Into<String>, value: V) {
        self.values.lock().insert(key.into(), Box::new(value));
    }

    /// Retrieve a clone of the value under `key`.
    ///
    /// Returns `None` both when the key is absent and when the stored value
    /// is not a `V`; there is no implicit coercion.
    pub fn get<V: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<V> {
        self.values.lock().get(key).and_then(|v| v.downcast_ref::<V>().cloned())
    }
}
