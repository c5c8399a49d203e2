//! courier-transport-websocket: WebSocket transport for courier.
//!
//! Envelopes travel as text WebSocket messages, one message per envelope;
//! the WebSocket layer reassembles fragments, so `recv` always yields one
//! complete message. Binary messages from the peer are accepted as well and
//! handed up as their raw bytes.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_core::{ConnState, Connector, Error, Lane, Result, Transport};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// WebSocket-based transport implementation.
///
/// Works with any WebSocket stream (TCP, TLS, in-process duplex).
pub struct WebSocketTransport<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    /// Write half (async mutex: held across awaits).
    sink: AsyncMutex<SplitSink<WebSocketStream<S>, Message>>,
    /// Read half (async mutex: held across awaits).
    stream: AsyncMutex<SplitStream<WebSocketStream<S>>>,
    closed: AtomicBool,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an established WebSocket stream.
    pub fn new(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        WebSocketTransport {
            inner: Arc::new(Inner {
                sink: AsyncMutex::new(sink),
                stream: AsyncMutex::new(stream),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Whether the transport has observed or initiated a close.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl WebSocketTransport<tokio::io::DuplexStream> {
    /// Create a connected pair of WebSocket transports for testing.
    ///
    /// Runs a real client/server handshake over `tokio::io::duplex`.
    pub async fn pair() -> (Self, Self) {
        let (client_stream, server_stream) = tokio::io::duplex(65536);

        let (ws_client, ws_server) = tokio::join!(
            async {
                tokio_tungstenite::client_async("ws://localhost/", client_stream)
                    .await
                    .expect("client handshake failed")
                    .0
            },
            async {
                tokio_tungstenite::accept_async(server_stream)
                    .await
                    .expect("server handshake failed")
            }
        );

        (Self::new(ws_client), Self::new(ws_server))
    }
}

impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
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

        // The envelope codec always produces UTF-8; send as a text frame.
        let text = String::from_utf8(data)
            .map_err(|_| Error::codec("outbound frame is not valid UTF-8"))?;

        let mut sink = self.inner.sink.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::connection_with_source("websocket send failed", e))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>> {
        if self.is_closed() {
            return Ok(None);
        }

        let mut stream = self.inner.stream.lock().await;
        loop {
            let msg = match stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Err(Error::connection_with_source("websocket receive failed", e))
                }
                None => {
                    self.inner.closed.store(true, Ordering::Release);
                    return Ok(None);
                }
            };

            match msg {
                Message::Text(text) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(_) => {
                    self.inner.closed.store(true, Ordering::Release);
                    return Ok(None);
                }
                // Control frames are handled by tungstenite; keep reading.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        let mut sink = self.inner.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
        Ok(())
    }
}

/// Transport type produced by [`WsConnector`].
pub type WsStream = WebSocketTransport<MaybeTlsStream<TcpStream>>;

/// Connector that dials `ws[s]://{addr}/{path}`, with the path chosen per
/// lane.
pub struct WsConnector {
    pub enable_tls: bool,
    /// Receive buffer handed to the WebSocket layer.
    pub buffer_size: usize,
    /// Endpoint path for the system lane.
    pub system_path: String,
    /// Endpoint path for the user lane.
    pub user_path: String,
}

impl Default for WsConnector {
    fn default() -> Self {
        WsConnector {
            enable_tls: false,
            buffer_size: 8192,
            system_path: "system".to_string(),
            user_path: "game".to_string(),
        }
    }
}

impl Connector for WsConnector {
    type Transport = WsStream;

    async fn connect(&self, addr: &str, lane: Lane) -> Result<Self::Transport> {
        let scheme = if self.enable_tls { "wss" } else { "ws" };
        let path = match lane {
            Lane::System => &self.system_path,
            Lane::User => &self.user_path,
        };
        let url = format!("{scheme}://{addr}/{path}");

        let config = WebSocketConfig::default().read_buffer_size(self.buffer_size);
        let (ws, _response) = connect_async_with_config(url.as_str(), Some(config), false)
            .await
            .map_err(|e| {
                Error::connection_with_source(format!("websocket connect to {url} failed"), e)
            })?;
        debug!(%url, lane = lane.as_str(), "websocket connected");
        Ok(WebSocketTransport::new(ws))
    }
}
