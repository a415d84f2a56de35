//! Protocol error types

use thiserror::Error;

/// Errors produced by the pure protocol layer
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A guarded operation was attempted without an active session.
    ///
    /// This is a programming-contract violation on the caller's side,
    /// not a transient fault; it must not be retried.
    #[error("no active session")]
    NotInSession,

    /// An inbound frame could not be decoded, or an outbound message
    /// could not be encoded
    #[error("message codec error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
