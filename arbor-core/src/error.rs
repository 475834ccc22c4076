//! Error types for store operations.
//!
//! Reading missing data is never an error: absent paths read as `None`.
//! Errors only arise from writes that cannot be expressed in the tree
//! shape, from array methods applied to non-arrays, from compute functions
//! that fail while a computed property is being defined, and from snapshot
//! encoding.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors returned by [`Store`](crate::reactive::Store) and
/// [`PathHandle`](crate::reactive::PathHandle) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write tried to descend through a string, number or boolean.
    #[error("cannot write through non-container value at `{path}`")]
    NotAContainer { path: String },

    /// A non-numeric key was applied to an array.
    #[error("`{key}` is not a valid index for the array at `{path}`")]
    InvalidIndex { path: String, key: String },

    /// An array method was called on a path whose value is not an array.
    #[error("value at `{path}` is not an array")]
    NotAnArray { path: String },

    /// The array kept changing while it was being sorted.
    #[error("array at `{path}` changed while it was being sorted")]
    SortConflict { path: String },

    /// A compute function failed while its property was being defined.
    #[error("computed property `{path}` failed: {source}")]
    Compute {
        path: String,
        #[source]
        source: ComputeError,
    },

    /// Encoding or decoding a MessagePack snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        StoreError::Snapshot(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        StoreError::Snapshot(err.to_string())
    }
}

/// Failure raised by a compute function.
///
/// Compute functions may return any `Result<_, E>` where `E: Display`; the
/// error is captured here as a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ComputeError {
    message: String,
}

impl ComputeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
