// Failure diagnostics - classifies fetch error messages
//
// The router only counts failures; the classification is kept alongside
// the counters so operators can tell a dead origin from a rate limit.

use serde::{Deserialize, Serialize};

/// Why a strategy failed to produce a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Request exceeded its timeout
    Timeout,

    /// DNS, connect or other transport failure
    Connection,

    /// HTTP 429 or explicit throttling
    RateLimited,

    /// HTTP 401/403 or bot wall
    Forbidden,

    /// HTTP 404/410, channel page missing
    NotFound,

    /// HTTP 5xx
    ServerError,

    /// Body could not be read or decoded
    Decode,

    /// Anything else
    Unknown,
}

impl FailureKind {
    /// Whether the same request may well succeed a moment later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connection | Self::RateLimited | Self::ServerError
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "Upstream did not answer in time",
            Self::Connection => "Could not reach upstream",
            Self::RateLimited => "Rate limited by upstream",
            Self::Forbidden => "Access denied by upstream",
            Self::NotFound => "Channel page not found",
            Self::ServerError => "Upstream server error",
            Self::Decode => "Unreadable upstream response",
            Self::Unknown => "Unknown failure",
        }
    }
}

/// Classify an error message produced by a fetcher
pub fn classify_failure(error: &str) -> FailureKind {
    let lower = error.to_lowercase();

    if let Some(status) = http_status(&lower) {
        return match status {
            429 => FailureKind::RateLimited,
            401 | 403 => FailureKind::Forbidden,
            404 | 410 => FailureKind::NotFound,
            500..=599 => FailureKind::ServerError,
            _ => FailureKind::Unknown,
        };
    }

    if lower.contains("timed out") || lower.contains("timeout") {
        return FailureKind::Timeout;
    }

    if lower.contains("too many requests") || lower.contains("rate limit") {
        return FailureKind::RateLimited;
    }

    if lower.contains("forbidden") || lower.contains("captcha") {
        return FailureKind::Forbidden;
    }

    if lower.contains("dns")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("error trying to connect")
        || lower.contains("network unreachable")
        || lower.contains("transport error")
    {
        return FailureKind::Connection;
    }

    if lower.contains("decode") || lower.contains("invalid utf-8") {
        return FailureKind::Decode;
    }

    FailureKind::Unknown
}

/// Status code of an `HTTP <status>` message
fn http_status(lower: &str) -> Option<u16> {
    let rest = lower.strip_prefix("http ")?;
    rest.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_statuses() {
        assert_eq!(classify_failure("HTTP 404"), FailureKind::NotFound);
        assert_eq!(classify_failure("HTTP 429"), FailureKind::RateLimited);
        assert_eq!(classify_failure("HTTP 403"), FailureKind::Forbidden);
        assert_eq!(classify_failure("HTTP 503"), FailureKind::ServerError);
        assert_eq!(classify_failure("HTTP 418"), FailureKind::Unknown);
    }

    #[test]
    fn test_timeout_detection() {
        assert_eq!(
            classify_failure("Request timed out: operation timed out"),
            FailureKind::Timeout
        );
    }

    #[test]
    fn test_connection_detection() {
        assert_eq!(
            classify_failure("Transport error: error trying to connect: Connection refused"),
            FailureKind::Connection
        );
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify_failure("something odd"), FailureKind::Unknown);
        assert_eq!(classify_failure(""), FailureKind::Unknown);
    }

    #[test]
    fn test_transient_kinds() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::ServerError.is_transient());
        assert!(!FailureKind::NotFound.is_transient());
        assert!(!FailureKind::Forbidden.is_transient());
    }
}
