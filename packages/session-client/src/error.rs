//! Client error types
//!
//! Propagation policy: transient network faults (timeouts, transport
//! errors, send failures) are recovered locally through reconnect and
//! re-queue, and reach collaborators only as advisory notifications.
//! Precondition violations (`NoCredentials`, `NotInSession` via
//! [`ProtocolError`]) are returned synchronously to the caller.

use thiserror::Error;

use listenalong_session_protocol::ProtocolError;

use crate::transport::TransportError;

/// Errors surfaced by the session client
#[derive(Error, Debug)]
pub enum ClientError {
    /// No bearer token is available; the caller must refresh
    /// credentials before retrying
    #[error("no authentication token available")]
    NoCredentials,

    /// The transport handshake did not complete within the configured
    /// connect timeout
    #[error("connection attempt timed out")]
    ConnectTimeout,

    /// Underlying transport failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A message could not be delivered after exhausting retries
    #[error("message delivery failed after {attempts} attempts")]
    SendFailure { attempts: u32 },

    /// The operation requires an open connection
    #[error("not connected")]
    NotConnected,

    /// Protocol-level failure (codec error or missing session)
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The listen endpoint could not be derived from the configured
    /// API base address
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// The client task has shut down
    #[error("session client is closed")]
    Closed,
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
