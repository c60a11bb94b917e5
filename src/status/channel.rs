// Channel reference normalization
//
// Accepts either a bare channel id ("rina") or a channel URL on the
// platform domain ("https://www.pandalive.co.kr/channel/rina",
// "https://pandalive.co.kr/rina") and yields the canonical key.

use url::Url;

use super::models::ChannelKey;

/// Registrable domain of the streaming platform
pub const PLATFORM_DOMAIN: &str = "pandalive.co.kr";

/// Optional leading path segment in channel URLs
const CHANNEL_PREFIX: &str = "channel";

/// Parse a free-form reference into a channel key.
///
/// Returns `None` for URLs on other hosts, URLs without a usable path
/// segment, and bare strings outside `[A-Za-z0-9_]+`.
pub fn normalize(reference: &str) -> Option<ChannelKey> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    match Url::parse(reference) {
        Ok(url) => key_from_url(&url),
        Err(_) => is_identifier(reference).then(|| ChannelKey::from_validated(reference.to_string())),
    }
}

fn key_from_url(url: &Url) -> Option<ChannelKey> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    if !is_platform_host(&host) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let mut candidate = segments.next()?;
    if candidate.eq_ignore_ascii_case(CHANNEL_PREFIX) {
        candidate = segments.next()?;
    }

    is_identifier(candidate).then(|| ChannelKey::from_validated(candidate.to_string()))
}

fn is_platform_host(host: &str) -> bool {
    host == PLATFORM_DOMAIN
        || host
            .strip_suffix(PLATFORM_DOMAIN)
            .map_or(false, |prefix| prefix.ends_with('.'))
}

/// Conservative identifier pattern: ASCII letters, digits, underscore
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
