//! Codec for typed value objects stored as list or ranked-set members.
//!
//! Members of lists and ranked sets are text, but the values pushed into them
//! (payments, sensor readings, ...) are structured. Every such value goes
//! through this codec: `MsgPack` with named fields via `rmp-serde`, wrapped in
//! standard base64. Named-field encoding keeps the output stable for a given
//! value, which makes re-inserting the same event an idempotent upsert.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Failure to encode or decode a value object.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode value: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("member is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Encodes a value object into its stored text form.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if `value` cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    let bytes = rmp_serde::to_vec_named(value)?;
    Ok(STANDARD.encode(bytes))
}

/// Decodes a stored member back into a value object.
///
/// # Errors
///
/// Returns [`CodecError::Base64`] or [`CodecError::Decode`] if `encoded` was not
/// produced by [`encode`] for a compatible type.
pub fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T, CodecError> {
    let bytes = STANDARD.decode(encoded)?;
    Ok(rmp_serde::from_slice(&bytes)?)
}
