//! Endpoint error types.

use std::time::Duration;

use fdsim_core::ConfigError;

/// Errors surfaced to test code by endpoints and the listener.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Nothing arrived before the deadline.
    #[error("Timed out after {timeout:?} waiting for a request to {endpoint}")]
    Timeout {
        /// Endpoint description and address.
        endpoint: String,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The endpoint was closed and its request queue is drained.
    #[error("Endpoint closed: {endpoint}")]
    Closed {
        /// Endpoint description and address.
        endpoint: String,
    },

    /// The listener could not be bound.
    #[error("Failed to bind mock service listener on {address}: {source}")]
    Bind {
        /// Requested bind address.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid service configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for endpoint operations.
pub type EndpointResult<T> = Result<T, EndpointError>;
