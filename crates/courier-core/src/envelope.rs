//! The wire-level message unit exchanged over a channel.
//!
//! Envelopes travel as JSON text. The `kind` discriminant serializes under
//! the wire name `type` as its integer value; `data` and `success` may be
//! omitted by the peer and default to empty/false.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Message kind discriminant.
///
/// Determines correlation behavior: `Request`/`Push` originate a call,
/// `RequestBack` is the reply to a `Request`, and `PushBack` is a reply to a
/// `Push` that the origin silently discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Kind {
    /// Originates a call that expects a `RequestBack` reply.
    Request = 0,
    /// Originates a call; any `PushBack` reply is dropped by the origin.
    Push = 1,
    /// Reply to a `Request`.
    RequestBack = 2,
    /// Reply to a `Push`.
    PushBack = 3,
}

impl Kind {
    /// Convert from the wire value. Returns `None` for out-of-range values.
    pub fn from_u8(val: u8) -> Option<Self> {
        Some(match val {
            0 => Kind::Request,
            1 => Kind::Push,
            2 => Kind::RequestBack,
            3 => Kind::PushBack,
            _ => return None,
        })
    }

    /// Convert to the wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this kind is a reply to an earlier call.
    pub fn is_reply(self) -> bool {
        matches!(self, Kind::RequestBack | Kind::PushBack)
    }
}

impl TryFrom<u8> for Kind {
    type Error = UnknownKind;

    fn try_from(val: u8) -> std::result::Result<Self, UnknownKind> {
        Kind::from_u8(val).ok_or(UnknownKind(val))
    }
}

impl From<Kind> for u8 {
    fn from(kind: Kind) -> u8 {
        kind.as_u8()
    }
}

/// Error when converting an out-of-range wire value to a [`Kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownKind(pub u8);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message kind: {}", self.0)
    }
}

impl std::error::Error for UnknownKind {}

/// The structured record exchanged over a channel.
///
/// Invariant: `id` is unique among all outstanding calls on a channel at any
/// instant. `success` is meaningful only for reply kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub route: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Kind,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub success: bool,
}

impl Envelope {
    /// Build an originating envelope, `kind` being `Request` or `Push`.
    pub fn originate(route: &str, id: &str, kind: Kind, data: String) -> Self {
        Envelope {
            route: route.to_string(),
            id: id.to_string(),
            kind,
            data,
            success: false,
        }
    }

    /// Build a `RequestBack` reply correlated to `id`.
    pub fn reply(id: &str, success: bool, data: String) -> Self {
        Envelope {
            route: String::new(),
            id: id.to_string(),
            kind: Kind::RequestBack,
            data,
            success,
        }
    }

    /// Encode to wire bytes (JSON text).
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::codec(format!("envelope encode: {e}")))
    }

    /// Decode from wire bytes.
    ///
    /// Fails with [`Error::MalformedFrame`] on structurally invalid input,
    /// including a `type` value outside the known range.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::malformed(e.to_string()))
    }
}
