// Error types for status fetchers and configuration

use thiserror::Error;

/// Failure of a single upstream request.
///
/// Never crosses the engine's public contracts: fetchers turn it into
/// `ChannelStatus::failed` via its `Display` text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Upstream answered with a non-2xx status
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection, DNS or other transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Body could not be read or decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Target URL could not be built for the channel
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be constructed (bad proxy, TLS backend...)
    #[error("Client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::Http {
                status: status.as_u16(),
            };
        }
        if e.is_timeout() {
            return Self::Timeout(e.to_string());
        }
        if e.is_decode() || e.is_body() {
            return Self::Decode(e.to_string());
        }
        if e.is_builder() {
            return Self::InvalidUrl(e.to_string());
        }
        Self::Transport(e.to_string())
    }
}

/// Configuration loading failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message() {
        let err = FetchError::Http { status: 404 };
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[test]
    fn test_timeout_message_mentions_timeout() {
        let err = FetchError::Timeout("operation timed out".to_string());
        assert!(err.to_string().to_lowercase().contains("timed out"));
    }
}
