//! Ordered, prefix-matched inbound interceptors.
//!
//! Every entry whose prefix matches the inbound route runs in registration
//! order before the route handler, side-effecting the shared [`Context`].
//! Matching is plain string prefix, so `"/a"` matches `"/ab"` as well as
//! `"/a/b"`.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::Context;
use crate::error::Result;
use crate::transport::Transport;

/// An inbound interceptor. Receives the shared context and the raw payload.
pub type MiddlewareFn<T> = Arc<dyn Fn(&Context<T>, &str) -> Result<()> + Send + Sync>;

struct Entry<T: Transport> {
    prefix: String,
    handler: MiddlewareFn<T>,
}

/// Whether a middleware registered under `prefix` applies to `route`.
pub fn prefix_matches(prefix: &str, route: &str) -> bool {
    route.starts_with(prefix)
}

/// Registration-ordered middleware chain for one channel.
///
/// Entries are immutable once added. The chain tolerates concurrent reads
/// from the read loop while registrations are added.
pub struct MiddlewareChain<T: Transport> {
    entries: RwLock<Vec<Entry<T>>>,
}

impl<T: Transport> MiddlewareChain<T> {
    pub fn new() -> Self {
        MiddlewareChain {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append an interceptor for routes starting with `prefix`.
    pub fn add(&self, prefix: &str, handler: MiddlewareFn<T>) {
        self.entries.write().push(Entry {
            prefix: prefix.to_string(),
            handler,
        });
    }

    /// Collect the handlers applying to `route`, in registration order.
    ///
    /// Handlers are cloned out so no lock is held while they run; a handler
    /// may itself register more middleware without deadlocking.
    pub fn matching(&self, route: &str) -> Vec<MiddlewareFn<T>> {
        self.entries
            .read()
            .iter()
            .filter(|e| prefix_matches(&e.prefix, route))
            .map(|e| e.handler.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Transport> Default for MiddlewareChain<T> {
    fn default() -> Self {
        Self::new()
    }
}
