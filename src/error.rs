//! Error types for the Arena live client.

use thiserror::Error;

/// Errors that can occur when using the Arena live client.
#[derive(Debug, Error)]
pub enum ArenaLiveError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but no
    /// target is currently connected.
    #[error("not connected to a live target")]
    NotConnected,

    /// An HTTP request to a polling endpoint failed at the transport level.
    #[cfg(feature = "rest")]
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A polling endpoint answered with a non-success status.
    #[cfg(feature = "rest")]
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        /// HTTP status code returned by the server.
        status: reqwest::StatusCode,
        /// Response body, captured for diagnostics.
        body: String,
    },

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Arena live client operations.
pub type Result<T> = std::result::Result<T, ArenaLiveError>;
