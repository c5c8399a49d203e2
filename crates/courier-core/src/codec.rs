//! Payload conversion between application values and the envelope `data`
//! string.
//!
//! Conversion is resolved at the call site through the type system: text and
//! byte values pass through unmodified, and structured values opt into JSON
//! by wrapping themselves in [`Json`]. There is no runtime type inspection.
//!
//! The wire `data` field is UTF-8 text, so byte payloads must themselves be
//! valid UTF-8; anything else is a [`Error::Codec`] at the sending side.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Conversion of an application value into an envelope payload.
pub trait IntoPayload {
    fn into_payload(self) -> Result<String>;
}

/// Conversion of an envelope payload into an application value.
pub trait FromPayload: Sized {
    fn from_payload(payload: &str) -> Result<Self>;
}

// Fast paths: text and bytes bypass structured encoding entirely.

impl IntoPayload for String {
    fn into_payload(self) -> Result<String> {
        Ok(self)
    }
}

impl IntoPayload for &str {
    fn into_payload(self) -> Result<String> {
        Ok(self.to_string())
    }
}

impl IntoPayload for Vec<u8> {
    fn into_payload(self) -> Result<String> {
        String::from_utf8(self).map_err(|_| Error::codec("byte payload is not valid UTF-8"))
    }
}

impl IntoPayload for &[u8] {
    fn into_payload(self) -> Result<String> {
        std::str::from_utf8(self)
            .map(str::to_string)
            .map_err(|_| Error::codec("byte payload is not valid UTF-8"))
    }
}

impl IntoPayload for () {
    fn into_payload(self) -> Result<String> {
        Ok(String::new())
    }
}

impl FromPayload for String {
    fn from_payload(payload: &str) -> Result<Self> {
        Ok(payload.to_string())
    }
}

impl FromPayload for Vec<u8> {
    fn from_payload(payload: &str) -> Result<Self> {
        Ok(payload.as_bytes().to_vec())
    }
}

impl FromPayload for () {
    fn from_payload(_payload: &str) -> Result<Self> {
        Ok(())
    }
}

/// Marker routing a structured value through the JSON codec.
///
/// ```ignore
/// let Json(profile): Json<Profile> = channel.call("/profile/get", Json(query)).await?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoPayload for Json<T> {
    fn into_payload(self) -> Result<String> {
        serde_json::to_string(&self.0).map_err(|e| Error::codec(format!("marshal: {e}")))
    }
}

impl<T: DeserializeOwned> FromPayload for Json<T> {
    fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map(Json)
            .map_err(|e| Error::codec(format!("unmarshal: {e}")))
    }
}
