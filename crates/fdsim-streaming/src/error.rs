//! Streaming client error types.

use std::time::Duration;

/// Errors from reading a server-sent event stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The server answered with a non-success status.
    #[error("HTTP error: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Status reason.
        message: String,
    },

    /// An incomplete event grew past the configured limit.
    #[error("Buffer overflow: {size} bytes exceeds limit of {limit}")]
    BufferOverflow {
        /// Current size.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// No event arrived in time.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The server ended the stream.
    #[error("Stream closed by server")]
    Closed,

    /// Request method not representable.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// HTTP client error.
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

/// Result type for streaming client operations.
pub type StreamResult<T> = Result<T, StreamError>;
