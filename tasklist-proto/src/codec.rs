//! Serialization for the `tasklist` wire protocol.
//!
//! Frames are encoded with postcard. WebSocket preserves message
//! boundaries, so no length prefix is needed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a frame into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the frame cannot be serialized.
pub fn encode<T: Serialize>(frame: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(frame).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a frame from a byte slice using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Leading fields of an encoded `ClientFrame::Call`: the variant index
/// followed by the call id.
#[derive(Deserialize)]
struct CallHeader {
    variant: u32,
    call_id: u64,
}

/// Reads the call id from the front of an encoded client frame without
/// decoding the request.
///
/// Returns `None` if the bytes do not start with a `Call` header.
#[must_use]
pub fn peek_call_id(bytes: &[u8]) -> Option<u64> {
    let (header, _rest) = postcard::take_from_bytes::<CallHeader>(bytes).ok()?;
    (header.variant == 0).then_some(header.call_id)
}
