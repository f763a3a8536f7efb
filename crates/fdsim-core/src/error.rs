//! Configuration error types.

/// Errors raised while loading or validating [`crate::MockServiceConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field holds a value the service cannot run with.
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// TOML parsing error.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
