//! courier: Client-side routed RPC over persistent bidirectional streams.
//!
//! A [`Client`] exchanges asynchronous, correlated messages with remote
//! endpoints over two WebSocket channels: a system control channel that
//! handles the bootstrap handshake (including transparent redirection to a
//! lower-load backend) and a user data channel carrying application traffic.
//! Inbound messages flow through a prefix-matched middleware chain into
//! exact-route handlers; outbound calls are correlated to their replies by
//! id, with per-call timeouts.
//!
//! # Example
//!
//! ```ignore
//! use courier::{Client, Config, WsConnector};
//!
//! let client = Client::new(Config::default(), WsConnector::default());
//! client.register_handler("/room/kick", |ctx, reason| {
//!     println!("kicked: {reason}");
//!     Ok(None)
//! })?;
//! client.connect().await?;
//!
//! let motd: String = client.call("/motd", "").await?;
//! client.push("/presence", r#"{"online":true}"#).await?;
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;

pub use client::{Client, BOOTSTRAP_ROUTE, MAX_REDIRECT_HOPS};
pub use config::Config;

pub use courier_core::{
    Channel, ConnState, Connector, Context, Envelope, Error, FromPayload, IntoPayload, Json, Kind,
    Lane, Result, Transport,
};
pub use courier_transport_websocket::{WebSocketTransport, WsConnector, WsStream};

/// Build a client over the WebSocket connector described by `config`.
pub fn websocket_client(config: Config) -> Client<WsConnector> {
    let connector = WsConnector {
        enable_tls: config.enable_tls,
        buffer_size: config.buffer_size,
        ..WsConnector::default()
    };
    Client::new(config, connector)
}
