//! Client configuration loaded from environment

use std::env;

use anyhow::{Context, Result};

/// Default endpoint when nothing is configured (local DevTools socket).
pub const DEFAULT_URL: &str = "ws://127.0.0.1:9222/devtools/browser";

/// Default ceiling for a single outbound payload, in bytes.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for one client connection
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the remote peer
    pub url: String,
    /// Largest outbound payload the transport will accept; bigger writes
    /// are rejected before they reach the socket
    pub max_payload_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl ClientConfig {
    /// Build a config for the given endpoint with default limits.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("WIREMUX_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            max_payload_bytes: env::var("WIREMUX_MAX_PAYLOAD_BYTES")
                .unwrap_or_else(|_| DEFAULT_MAX_PAYLOAD_BYTES.to_string())
                .parse()
                .context("WIREMUX_MAX_PAYLOAD_BYTES must be a byte count")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn test_new_keeps_default_limits() {
        let config = ClientConfig::new("ws://localhost:9000/session");
        assert_eq!(config.url, "ws://localhost:9000/session");
        assert_eq!(config.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
    }
}
