//! Error types shared by the store client and the index layers.

use kvdex_core::CodecError;

/// Errors surfaced by a [`StoreClient`](crate::client::StoreClient).
///
/// Absence of a key is never an error: reads of missing keys return empty
/// values. Errors are reserved for an unreachable store, type mismatches,
/// and values the store refuses to hold.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached. Fatal at startup; never retried by this layer.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The key exists but holds a different kind of value.
    #[error("key {key} holds a {actual}, not a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// A ranked-set score was NaN.
    #[error("score for {member} in {key} is not a number")]
    NotANumber { key: String, member: String },
    /// A scalar counter was incremented but does not hold an integer.
    #[error("value at {key} is not an integer")]
    NotAnInteger { key: String },
    /// A stored member could not be decoded into its value object.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Returns `true` for [`StoreError::Unavailable`].
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
