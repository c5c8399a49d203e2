//! Error taxonomy for courier.
//!
//! Failures inside a channel's read loop are contained to the message being
//! processed (logged, optionally turned into a wire-level failure reply) and
//! never tear down the loop. Failures in caller-initiated operations
//! propagate synchronously to that caller alone.

use std::fmt;

/// Errors surfaced by courier operations.
#[derive(Debug)]
pub enum Error {
    /// Transport handshake, send, or receive failure. Fatal to the affected
    /// channel; the core does not retry.
    Connection {
        detail: String,
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    /// Attempted to send on a channel whose connection is absent or not open.
    NotConnected,
    /// The connection dropped while a call was still waiting for its reply.
    Closed,
    /// No reply arrived within the configured window.
    Timeout { route: String },
    /// The peer explicitly reported failure for a call.
    Remote { message: String },
    /// An inbound message could not be decoded into an envelope.
    MalformedFrame { detail: String },
    /// Payload marshaling or unmarshaling failed.
    Codec { detail: String },
    /// An inbound request named a route with no registered handler.
    /// Converted into a failure reply on the wire, never raised to a caller.
    NoHandler { route: String },
    /// A route handler or middleware reported failure while processing an
    /// inbound message. Converted into a failure reply on the wire.
    Handler { message: String },
    /// A handler is already registered for this exact route.
    DuplicateRoute { route: String },
    /// The bootstrap redirection chain exceeded the hop bound.
    RedirectLimit { hops: usize },
}

impl Error {
    /// Create a [`Error::Connection`] from a plain description.
    pub fn connection(detail: impl Into<String>) -> Self {
        Error::Connection {
            detail: detail.into(),
            source: None,
        }
    }

    /// Create a [`Error::Connection`] wrapping an underlying transport error.
    pub fn connection_with_source(
        detail: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Connection {
            detail: detail.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a [`Error::MalformedFrame`].
    pub fn malformed(detail: impl Into<String>) -> Self {
        Error::MalformedFrame {
            detail: detail.into(),
        }
    }

    /// Create a [`Error::Codec`].
    pub fn codec(detail: impl Into<String>) -> Self {
        Error::Codec {
            detail: detail.into(),
        }
    }

    /// Create a [`Error::Handler`]. Intended for handler and middleware
    /// implementations that want to fail the message they are processing.
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler {
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection { detail, .. } => write!(f, "connection error: {detail}"),
            Error::NotConnected => write!(f, "connection is not open"),
            Error::Closed => write!(f, "connection closed while waiting for reply"),
            Error::Timeout { route } => write!(f, "request to {route} timed out"),
            Error::Remote { message } => write!(f, "remote error: {message}"),
            Error::MalformedFrame { detail } => write!(f, "malformed frame: {detail}"),
            Error::Codec { detail } => write!(f, "codec error: {detail}"),
            Error::NoHandler { route } => write!(f, "no handler for route {route}"),
            Error::Handler { message } => write!(f, "handler failed: {message}"),
            Error::DuplicateRoute { route } => {
                write!(f, "handler already registered for route {route}")
            }
            Error::RedirectLimit { hops } => {
                write!(f, "bootstrap redirection exceeded {hops} hops")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection { source, .. } => source.as_ref().map(|e| e.as_ref() as _),
            _ => None,
        }
    }
}

/// Result type alias for courier operations.
pub type Result<T> = std::result::Result<T, Error>;
