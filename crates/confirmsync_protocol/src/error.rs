//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while parsing or encoding protocol values.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A flag name that is not one of `pre_filled`, `confirmed`, `new_data`.
    #[error("unknown flag name: {0:?}")]
    UnknownFlag(String),

    /// A field name that is empty or only whitespace.
    #[error("field name must not be empty")]
    EmptyFieldName,

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
