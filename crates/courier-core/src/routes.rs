//! Route table: exact route names bound to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// A route handler. Consumes the context and raw payload; returning
/// `Some(payload)` puts that payload in the success reply, `None` sends an
/// empty one.
pub type HandlerFn<T> =
    Arc<dyn Fn(&Context<T>, &str) -> Result<Option<String>> + Send + Sync>;

/// Per-channel mapping from exact route name to handler.
///
/// At most one handler per route; a second registration for the same route
/// is rejected with [`Error::DuplicateRoute`]. Concurrent reads from the
/// read loop are fine while registrations are added.
pub struct RouteTable<T: Transport> {
    routes: RwLock<HashMap<String, HandlerFn<T>>>,
}

impl<T: Transport> RouteTable<T> {
    pub fn new() -> Self {
        RouteTable {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Bind `handler` to `route`.
    pub fn insert(&self, route: &str, handler: HandlerFn<T>) -> Result<()> {
        let mut routes = self.routes.write();
        if routes.contains_key(route) {
            return Err(Error::DuplicateRoute {
                route: route.to_string(),
            });
        }
        routes.insert(route.to_string(), handler);
        Ok(())
    }

    /// Look up the handler for `route`, cloned out so no lock is held while
    /// it runs.
    pub fn get(&self, route: &str) -> Option<HandlerFn<T>> {
        self.routes.read().get(route).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

impl<T: Transport> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
