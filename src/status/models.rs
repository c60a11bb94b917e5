// Common data models for status resolution

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use super::channel;

/// Canonical identifier of one broadcaster (the path segment of its
/// channel URL, without scheme or host).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Normalize a free-form reference (bare id or channel URL).
    pub fn parse(reference: &str) -> Option<Self> {
        channel::normalize(reference)
    }

    /// Wrap an id that already passed validation.
    pub(crate) fn from_validated(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Acquisition strategy that produced a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    /// Lightweight channel-page strategy with strict offline-first rules
    Primary,
    /// Heavier strategy: alternate page shape plus the live listing
    Backup,
}

impl StatusSource {
    /// The other strategy
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Backup,
            Self::Backup => Self::Primary,
        }
    }
}

impl fmt::Display for StatusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Backup => write!(f, "backup"),
        }
    }
}

/// How a status should be read by consumers that care about the difference
/// between "known offline" and "could not ask".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Live,
    Offline,
    Unknown,
}

/// Result of one resolution attempt.
///
/// Either `error_message` is set (and `is_live` is false, every other field
/// empty) or the fetch succeeded and the optional fields carry whatever the
/// extractors found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub channel_key: ChannelKey,
    pub is_live: bool,
    pub title: Option<String>,
    pub viewer_count: Option<u64>,
    pub thumbnail_url: Option<String>,
    /// Broadcaster display name
    pub nickname: Option<String>,
    pub error_message: Option<String>,
    pub source: StatusSource,
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
}

impl ChannelStatus {
    /// Confirmed offline: the upstream answered and nothing indicated a live
    /// broadcast.
    pub fn offline(channel_key: ChannelKey, source: StatusSource) -> Self {
        Self {
            channel_key,
            is_live: false,
            title: None,
            viewer_count: None,
            thumbnail_url: None,
            nickname: None,
            error_message: None,
            source,
            checked_at: OffsetDateTime::now_utc(),
        }
    }

    /// Live with no further details yet
    pub fn live(channel_key: ChannelKey, source: StatusSource) -> Self {
        Self {
            is_live: true,
            ..Self::offline(channel_key, source)
        }
    }

    /// Could not determine the status
    pub fn failed(
        channel_key: ChannelKey,
        source: StatusSource,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::offline(channel_key, source)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn outcome(&self) -> Outcome {
        match (self.is_error(), self.is_live) {
            (true, _) => Outcome::Unknown,
            (false, true) => Outcome::Live,
            (false, false) => Outcome::Offline,
        }
    }
}

/// Status of one caller-supplied reference; `status` is `None` when the
/// reference is not a recognizable channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceStatus {
    pub reference: String,
    pub status: Option<ChannelStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> ChannelKey {
        ChannelKey::parse(id).unwrap()
    }

    #[test]
    fn test_failed_status_is_not_live() {
        let status = ChannelStatus::failed(key("alice"), StatusSource::Primary, "HTTP 500");
        assert!(!status.is_live);
        assert_eq!(status.outcome(), Outcome::Unknown);
        assert_eq!(status.error_message.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn test_offline_and_unknown_are_distinct() {
        let offline = ChannelStatus::offline(key("bob"), StatusSource::Backup);
        let unknown = ChannelStatus::failed(key("bob"), StatusSource::Backup, "timeout");
        assert_eq!(offline.outcome(), Outcome::Offline);
        assert_ne!(offline.outcome(), unknown.outcome());
    }

    #[test]
    fn test_serializes_source_and_timestamp() {
        let status = ChannelStatus::live(key("alice"), StatusSource::Primary);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["source"], "primary");
        assert_eq!(json["channel_key"], "alice");
        assert!(json["checked_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_other_source() {
        assert_eq!(StatusSource::Primary.other(), StatusSource::Backup);
        assert_eq!(StatusSource::Backup.other(), StatusSource::Primary);
    }
}
