//! Mock service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Configuration for the mock service listener and its queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockServiceConfig {
    /// Socket address to listen on (default: `127.0.0.1:0`, an ephemeral port)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Externally visible base URL, when it differs from the bound address
    /// (for example when the SDK under test runs in a container)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,

    /// Number of recorded requests each endpoint retains before dropping
    #[serde(default = "default_request_queue_capacity")]
    pub request_queue_capacity: usize,

    /// Number of analytics batches retained before senders are held back
    #[serde(default = "default_event_batch_capacity")]
    pub event_batch_capacity: usize,

    /// Largest request body buffered by an endpoint
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Interval for keep-alive comments on stream connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_keepalive_secs: Option<u64>,
}

fn default_bind_address() -> String {
    "127.0.0.1:0".into()
}

const fn default_request_queue_capacity() -> usize {
    10
}

const fn default_event_batch_capacity() -> usize {
    100
}

const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for MockServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_base_url: None,
            request_queue_capacity: default_request_queue_capacity(),
            event_batch_capacity: default_event_batch_capacity(),
            max_body_bytes: default_max_body_bytes(),
            stream_keepalive_secs: None,
        }
    }
}

impl MockServiceConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or fails validation.
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for zero capacities or an empty bind address.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bind_address",
                reason: "must not be empty".into(),
            });
        }
        if self.request_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_queue_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.event_batch_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_batch_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.stream_keepalive_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "stream_keepalive_secs",
                reason: "must be at least 1 when set".into(),
            });
        }
        Ok(())
    }

    /// Set the bind address.
    #[must_use]
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Set the public base URL.
    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    /// Set the per-endpoint recorded request capacity.
    #[must_use]
    pub const fn with_request_queue_capacity(mut self, capacity: usize) -> Self {
        self.request_queue_capacity = capacity;
        self
    }

    /// Set the analytics batch capacity.
    #[must_use]
    pub const fn with_event_batch_capacity(mut self, capacity: usize) -> Self {
        self.event_batch_capacity = capacity;
        self
    }

    /// Set the largest request body an endpoint buffers.
    #[must_use]
    pub const fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Set the stream keep-alive interval.
    #[must_use]
    pub const fn with_stream_keepalive(mut self, interval: Duration) -> Self {
        self.stream_keepalive_secs = Some(interval.as_secs());
        self
    }

    /// Stream keep-alive interval, if enabled.
    #[must_use]
    pub fn stream_keepalive(&self) -> Option<Duration> {
        self.stream_keepalive_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MockServiceConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1:0");
        assert_eq!(config.request_queue_capacity, 10);
        assert_eq!(config.event_batch_capacity, 100);
        assert!(config.stream_keepalive().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_fills_defaults() {
        let config = MockServiceConfig::from_toml_str(
            r#"
            bind_address = "0.0.0.0:8111"
            public_base_url = "http://host.docker.internal:8111"
            stream_keepalive_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8111");
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("http://host.docker.internal:8111")
        );
        assert_eq!(config.request_queue_capacity, 10);
        assert_eq!(config.stream_keepalive(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = MockServiceConfig::from_toml_str("request_queue_capacity = 0");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "request_queue_capacity",
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_toml() {
        let result = MockServiceConfig::from_toml_str("bind_address = ");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
