//! courier-core: Core types and the message-correlation engine for courier.
//!
//! This crate defines:
//! - The wire envelope and its kind discriminant ([`Envelope`], [`Kind`])
//! - Payload conversion ([`IntoPayload`], [`FromPayload`], [`Json`])
//! - The per-message scratch state handed to handlers ([`Context`])
//! - Inbound interceptors ([`MiddlewareChain`])
//! - Route dispatch ([`RouteTable`])
//! - Request/response correlation ([`PendingCalls`])
//! - The channel manager and its read loop ([`Channel`])
//! - Transport seams ([`Transport`], [`Connector`], [`Lane`])
//! - The error taxonomy ([`Error`])

#![forbid(unsafe_code)]

mod channel;
mod codec;
mod context;
mod envelope;
mod error;
mod middleware;
mod pending;
mod routes;
mod transport;

pub use channel::*;
pub use codec::*;
pub use context::*;
pub use envelope::*;
pub use error::*;
pub use middleware::*;
pub use pending::*;
pub use routes::*;
pub use transport::*;
