//! Connection orchestrator and user-facing API.
//!
//! A client owns two channels over one connector: the system channel carries
//! the bootstrap handshake, the user channel carries application traffic.
//! `connect` sequences the two-phase bootstrap: open the system channel, ask
//! it for a better endpoint, and either settle the user channel where we are
//! or rehome both channels at the returned address. A fleet behind a gateway
//! uses this to route new clients to its least-loaded backend without the
//! backend terminating the initial handshake.

use courier_core::{
    Channel, Connector, Context, Error, FromPayload, IntoPayload, Json, Lane, Result,
};
use tracing::{debug, info};

use crate::config::Config;

/// Route the system channel queries for a better endpoint during bootstrap.
pub const BOOTSTRAP_ROUTE: &str = "/get_low_load_server_addr";

/// Redirection chain bound. An always-redirecting gateway is a
/// configuration error and fails with [`Error::RedirectLimit`] rather than
/// looping forever.
pub const MAX_REDIRECT_HOPS: usize = 8;

/// A client holding one system and one user channel.
///
/// Registration and call operations on the client address the user channel;
/// the system channel is reachable through [`Client::system`] for control
/// traffic.
pub struct Client<C: Connector> {
    config: Config,
    connector: C,
    system: Channel<C::Transport>,
    user: Channel<C::Transport>,
}

impl<C: Connector> Client<C> {
    /// Create a disconnected client. Handlers and middleware may be
    /// registered before [`Client::connect`].
    pub fn new(config: Config, connector: C) -> Self {
        let system = Channel::new("system", config.timeout);
        let user = Channel::new("user", config.timeout);
        Client {
            config,
            connector,
            system,
            user,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The control channel.
    pub fn system(&self) -> &Channel<C::Transport> {
        &self.system
    }

    /// The data channel.
    pub fn user(&self) -> &Channel<C::Transport> {
        &self.user
    }

    /// Run the two-phase bootstrap and settle both channels.
    ///
    /// Each hop opens the system channel and asks for a lower-load endpoint;
    /// an empty answer terminates the chain and the user channel opens at
    /// the current address. The payload tells the gateway whether this is a
    /// fresh connection or a redirect hop.
    pub async fn connect(&self) -> Result<()> {
        let mut addr = self.config.origin();

        for hop in 0..MAX_REDIRECT_HOPS {
            let transport = self.connector.connect(&addr, Lane::System).await?;
            self.system.open(transport);

            let next: String = self.system.call(BOOTSTRAP_ROUTE, Json(hop == 0)).await?;
            if next.is_empty() {
                let transport = self.connector.connect(&addr, Lane::User).await?;
                self.user.open(transport);
                info!(%addr, "connected");
                return Ok(());
            }

            debug!(from = %addr, to = %next, "redirected to low-load server");
            self.system.close().await?;
            addr = next;
        }

        Err(Error::RedirectLimit {
            hops: MAX_REDIRECT_HOPS,
        })
    }

    /// Close both channels.
    pub async fn close(&self) -> Result<()> {
        self.user.close().await?;
        self.system.close().await
    }

    /// Whether both channels hold open connections.
    pub fn is_connected(&self) -> bool {
        self.system.is_open() && self.user.is_open()
    }

    /// Issue a request on the user channel and await its reply.
    pub async fn call<P: IntoPayload, R: FromPayload>(&self, route: &str, payload: P) -> Result<R> {
        self.user.call(route, payload).await
    }

    /// Push-kind call on the user channel that still awaits its reply.
    pub async fn call_push<P: IntoPayload>(&self, route: &str, payload: P) -> Result<()> {
        self.user.call_push(route, payload).await
    }

    /// Fire-and-forget push on the user channel.
    pub async fn push<P: IntoPayload>(&self, route: &str, payload: P) -> Result<()> {
        self.user.push(route, payload).await
    }

    /// Bind a handler to an exact route on the user channel.
    pub fn register_handler<F>(&self, route: &str, handler: F) -> Result<()>
    where
        F: Fn(&Context<C::Transport>, &str) -> Result<Option<String>> + Send + Sync + 'static,
    {
        self.user.register_handler(route, handler)
    }

    /// Append an inbound interceptor for user-channel routes starting with
    /// `prefix`.
    pub fn register_middleware<F>(&self, prefix: &str, handler: F)
    where
        F: Fn(&Context<C::Transport>, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.user.register_middleware(prefix, handler)
    }
}
