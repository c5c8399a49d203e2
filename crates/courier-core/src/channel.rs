//! Channel manager: one logical connection with its pending-call table,
//! middleware chain, and route table.
//!
//! The key invariant is that only the channel's read loop calls
//! `transport.recv()`; all inbound routing happens there. Replies are
//! correlated to waiting callers through the pending-call table, and
//! everything else flows through the middleware chain into the route table.
//!
//! ```text
//!                      ┌───────────────────────────────┐
//!                      │            Channel            │
//!                      ├───────────────────────────────┤
//!                      │  conn: slot<Arc<T>>           │
//!                      │  pending: id -> oneshot       │
//!                      │  middlewares, routes          │
//!                      └──────────────┬────────────────┘
//!                                     │
//!                                read loop
//!                                     │
//!          ┌──────────────────────────┼──────────────────────────┐
//!          │                          │                          │
//!     PushBack (drop)       RequestBack (pending)      Request/Push (dispatch)
//!                                     │                          │
//!                           ┌─────────▼─────────┐   ┌────────────▼────────────┐
//!                           │ atomic remove,    │   │ middleware chain, then  │
//!                           │ fire continuation │   │ handler; reply for      │
//!                           └───────────────────┘   │ Request only            │
//!                                                   └─────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::codec::{FromPayload, IntoPayload};
use crate::context::Context;
use crate::envelope::{Envelope, Kind};
use crate::error::{Error, Result};
use crate::middleware::{MiddlewareChain, MiddlewareFn};
use crate::pending::{PendingCalls, Reply};
use crate::routes::{HandlerFn, RouteTable};
use crate::transport::Transport;

/// A cheaply cloneable handle to one logical channel.
///
/// Two instances exist per client (system and user); they are fully
/// independent. All operations are safe to invoke concurrently.
pub struct Channel<T: Transport> {
    inner: Arc<ChannelInner<T>>,
}

impl<T: Transport> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            inner: self.inner.clone(),
        }
    }
}

struct ChannelInner<T: Transport> {
    /// Stable name for log lines ("system" / "user").
    label: &'static str,
    /// Per-call reply window.
    timeout: Duration,
    /// Connection slot. Empty until `open`; replaced on reconnect.
    conn: Mutex<Option<Arc<T>>>,
    pending: PendingCalls,
    middlewares: MiddlewareChain<T>,
    routes: RouteTable<T>,
    next_id: AtomicU64,
}

impl<T: Transport> Channel<T> {
    /// Create a channel with empty tables and no connection.
    ///
    /// Handlers and middleware may be registered before `open`.
    pub fn new(label: &'static str, timeout: Duration) -> Self {
        Channel {
            inner: Arc::new(ChannelInner {
                label,
                timeout,
                conn: Mutex::new(None),
                pending: PendingCalls::new(),
                middlewares: MiddlewareChain::new(),
                routes: RouteTable::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Install `transport` in the connection slot and spawn the read loop.
    ///
    /// Reopening replaces the slot; the previous read loop ends when its own
    /// transport closes.
    pub fn open(&self, transport: T) {
        let transport = Arc::new(transport);
        *self.inner.conn.lock() = Some(transport.clone());
        tokio::spawn(read_loop(self.clone(), transport));
    }

    /// Close the installed transport, if any, and empty the slot.
    pub async fn close(&self) -> Result<()> {
        let conn = self.inner.conn.lock().take();
        match conn {
            Some(conn) => conn.close().await,
            None => Ok(()),
        }
    }

    /// Whether the channel currently holds an open connection.
    pub fn is_open(&self) -> bool {
        self.inner.conn.lock().as_ref().is_some_and(|c| c.is_open())
    }

    /// Number of calls currently awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.len()
    }

    /// Issue a `Request` and await its correlated `RequestBack`.
    ///
    /// Registers a pending entry keyed by a fresh id, sends, then waits for
    /// the continuation or the per-client timeout, whichever fires first.
    /// A reply with `success=false` surfaces as [`Error::Remote`].
    pub async fn call<P: IntoPayload, R: FromPayload>(&self, route: &str, payload: P) -> Result<R> {
        let data = self
            .call_raw(route, payload.into_payload()?, Kind::Request)
            .await?;
        R::from_payload(&data)
    }

    /// `Push`-kind call that still awaits its correlated reply.
    ///
    /// Useful against peers that acknowledge pushes with a `RequestBack`;
    /// peers replying with `PushBack` will run this into the timeout, since
    /// the read loop discards those.
    pub async fn call_push<P: IntoPayload>(&self, route: &str, payload: P) -> Result<()> {
        self.call_raw(route, payload.into_payload()?, Kind::Push)
            .await
            .map(drop)
    }

    /// Fire-and-forget `Push`: no pending entry, no wait. Returns once the
    /// frame is handed to the transport.
    pub async fn push<P: IntoPayload>(&self, route: &str, payload: P) -> Result<()> {
        let env = Envelope::originate(route, &self.next_id(), Kind::Push, payload.into_payload()?);
        self.send_envelope(&env).await
    }

    /// Bind `handler` to an exact route. A second registration for the same
    /// route is rejected with [`Error::DuplicateRoute`].
    pub fn register_handler<F>(&self, route: &str, handler: F) -> Result<()>
    where
        F: Fn(&Context<T>, &str) -> Result<Option<String>> + Send + Sync + 'static,
    {
        let handler: HandlerFn<T> = Arc::new(handler);
        self.inner.routes.insert(route, handler)
    }

    /// Append an inbound interceptor for routes starting with `prefix`.
    pub fn register_middleware<F>(&self, prefix: &str, handler: F)
    where
        F: Fn(&Context<T>, &str) -> Result<()> + Send + Sync + 'static,
    {
        let handler: MiddlewareFn<T> = Arc::new(handler);
        self.inner.middlewares.add(prefix, handler)
    }

    fn next_id(&self) -> String {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    async fn call_raw(&self, route: &str, data: String, kind: Kind) -> Result<String> {
        let id = self.next_id();
        let rx = self.inner.pending.register(&id);

        let env = Envelope::originate(route, &id, kind, data);
        if let Err(e) = self.send_envelope(&env).await {
            self.inner.pending.discard(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(reply)) => {
                if reply.success {
                    Ok(reply.data)
                } else {
                    Err(Error::Remote {
                        message: reply.data,
                    })
                }
            }
            // Sender dropped: the read loop cleared the table on close.
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => {
                self.inner.pending.discard(&id);
                Err(Error::Timeout {
                    route: route.to_string(),
                })
            }
        }
    }

    async fn send_envelope(&self, env: &Envelope) -> Result<()> {
        let conn = self.inner.conn.lock().clone().ok_or(Error::NotConnected)?;
        if !conn.is_open() {
            return Err(Error::NotConnected);
        }
        conn.send(env.encode()?).await
    }
}

/// Read loop for one connection. Runs as its own task until the transport
/// closes or fails; per-message failures never terminate it.
async fn read_loop<T: Transport>(channel: Channel<T>, transport: Arc<T>) {
    let label = channel.inner.label;
    debug!(channel = label, "read loop started");

    loop {
        let data = match transport.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(channel = label, "connection closed");
                break;
            }
            Err(e) => {
                error!(channel = label, error = %e, "receive failed, stopping read loop");
                break;
            }
        };

        let env = match Envelope::decode(&data) {
            Ok(env) => env,
            Err(e) => {
                warn!(channel = label, error = %e, "dropping malformed frame");
                continue;
            }
        };

        match env.kind {
            // Replies to pushes are discarded.
            Kind::PushBack => {}
            Kind::RequestBack => {
                let delivered = channel.inner.pending.complete(
                    &env.id,
                    Reply {
                        data: env.data,
                        success: env.success,
                    },
                );
                if !delivered {
                    debug!(channel = label, id = %env.id, "late or duplicate reply dropped");
                }
            }
            Kind::Request | Kind::Push => dispatch(&channel, &transport, env).await,
        }
    }

    // Wake every waiting caller; their replies can no longer arrive. Skip
    // this when a reconnect already installed a fresh transport, whose
    // in-flight calls are not ours to cancel.
    let still_current = {
        let conn = channel.inner.conn.lock();
        match conn.as_ref() {
            None => true,
            Some(current) => Arc::ptr_eq(current, &transport),
        }
    };
    if still_current {
        channel.inner.pending.clear();
    }
    debug!(channel = label, "read loop stopped");
}

/// Run the middleware chain and route handler for one inbound message, and
/// send the synthesized reply when the message warrants one.
async fn dispatch<T: Transport>(channel: &Channel<T>, transport: &Arc<T>, env: Envelope) {
    let label = channel.inner.label;
    let ctx = Context::new(channel.clone());

    let outcome = run_pipeline(channel, &ctx, &env);
    if let Err(e) = &outcome {
        warn!(channel = label, route = %env.route, error = %e, "inbound dispatch failed");
    }

    // Only a Request warrants a RequestBack; inbound pushes get no reply.
    if env.kind != Kind::Request {
        return;
    }

    let reply = match outcome {
        Ok(data) => Envelope::reply(&env.id, true, data.unwrap_or_default()),
        Err(e) => Envelope::reply(&env.id, false, e.to_string()),
    };
    let bytes = match reply.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(channel = label, id = %env.id, error = %e, "failed to encode reply");
            return;
        }
    };
    if let Err(e) = transport.send(bytes).await {
        error!(channel = label, id = %env.id, error = %e, "failed to send reply");
    }
}

fn run_pipeline<T: Transport>(
    channel: &Channel<T>,
    ctx: &Context<T>,
    env: &Envelope,
) -> Result<Option<String>> {
    for mw in channel.inner.middlewares.matching(&env.route) {
        mw(ctx, &env.data)?;
    }
    let handler = channel
        .inner
        .routes
        .get(&env.route)
        .ok_or_else(|| Error::NoHandler {
            route: env.route.clone(),
        })?;
    handler(ctx, &env.data)
}
