// Backup fetcher - alternate channel page shape plus the live listing
//
// Advantages:
// - Independent request shape (mobile identity, no cache reuse)
// - Can enumerate every live channel in one call via the listing
//
// Disadvantages:
// - Looser liveness heuristic, no offline-first short-circuit
// - Listing surfaces are often rendered client-side and may carry no data

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, USER_AGENT,
};
use serde::{Deserialize, Deserializer};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::signals::{self, FieldExtractor, LivenessRules, PageRules, Signal, SignalSet};
use super::traits::{ActiveListing, Listing, ListingOrigin, StatusFetcher};
use crate::status::channel;
use crate::status::config::EngineConfig;
use crate::status::errors::FetchError;
use crate::status::http;
use crate::status::models::{ChannelKey, ChannelStatus, StatusSource};

lazy_static::lazy_static! {
    static ref RULES: PageRules = PageRules {
        liveness: LivenessRules::loose(SignalSet::new(vec![
            Signal::new("is-live-true", Regex::new(r#"(?i)"isLive"\s*:\s*true"#).unwrap()),
            Signal::new("live-class", Regex::new(r#"(?i)class\s*=\s*"[^"]*live[^"]*""#).unwrap()),
            Signal::new("data-live", Regex::new(r#"(?i)data-live\s*=\s*"true""#).unwrap()),
            Signal::new("broadcasting-true", Regex::new(r#"(?i)"broadcasting"\s*:\s*true"#).unwrap()),
            Signal::new("live-status-on", Regex::new(r#"(?i)"liveStatus"\s*:\s*"on""#).unwrap()),
        ])),
        title: vec![
            FieldExtractor::new(
                "title-element",
                Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap(),
                signals::page_title,
            ),
            FieldExtractor::new(
                "og-title",
                Regex::new(r#"(?i)<meta[^>]+property\s*=\s*"og:title"[^>]*?content\s*=\s*"([^"]*)""#).unwrap(),
                signals::text,
            ),
        ],
        viewer_count: vec![
            FieldExtractor::new(
                "viewer-count-field",
                Regex::new(r#""(?:viewerCount|userCount|user)"\s*:\s*"?([\d,]+)"#).unwrap(),
                signals::count,
            ),
            FieldExtractor::new(
                "watching-ko",
                Regex::new(r"([\d,]+)\s*명").unwrap(),
                signals::count,
            ),
        ],
        thumbnail: vec![
            FieldExtractor::new(
                "thumb-field",
                Regex::new(r#""(?:thumbUrl|thumbnailUrl)"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap(),
                signals::json_string,
            ),
            FieldExtractor::new(
                "og-image",
                Regex::new(r#"(?i)<meta[^>]+property\s*=\s*"og:image"[^>]*?content\s*=\s*"([^"]*)""#).unwrap(),
                signals::text,
            ),
        ],
        nickname: vec![
            FieldExtractor::new(
                "user-nick-field",
                Regex::new(r#""userNick"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap(),
                signals::json_string,
            ),
            FieldExtractor::new(
                "og-title-reversed",
                Regex::new(r#"(?i)<meta[^>]+content\s*=\s*"([^"]*)"[^>]*?property\s*=\s*"og:title""#).unwrap(),
                signals::text,
            ),
        ],
    };

    static ref INITIAL_STATE_RE: Regex =
        Regex::new(r"window\.__INITIAL_STATE__\s*=\s*").unwrap();
}

/// One entry of an upstream listing payload.
///
/// Every field is read leniently: a value of an unexpected type reads as
/// absent instead of rejecting the whole item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingItem {
    #[serde(default, deserialize_with = "lenient_id")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    user_nick: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    /// Current viewers
    #[serde(default, deserialize_with = "lenient_count")]
    user: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    thumb_url: Option<String>,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// Ids occasionally arrive as numbers
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => signals::count(s.trim()),
        _ => None,
    })
}

impl ListingItem {
    fn into_status(self) -> Option<ChannelStatus> {
        let user_id = self.user_id.filter(|id| channel::is_identifier(id))?;
        let key = ChannelKey::from_validated(user_id);
        Some(ChannelStatus {
            title: self.title.filter(|t| !t.trim().is_empty()),
            viewer_count: self.user,
            thumbnail_url: self.thumb_url.filter(|t| !t.is_empty()),
            nickname: self.user_nick.filter(|n| !n.trim().is_empty()),
            ..ChannelStatus::live(key, StatusSource::Backup)
        })
    }
}

/// Map a JSON array of listing items; malformed items are skipped
fn statuses_from_items(items: &[serde_json::Value]) -> Vec<ChannelStatus> {
    let statuses: Vec<ChannelStatus> = items
        .iter()
        .filter_map(|item| serde_json::from_value::<ListingItem>(item.clone()).ok())
        .filter_map(ListingItem::into_status)
        .collect();
    if statuses.len() < items.len() {
        debug!(
            dropped = items.len() - statuses.len(),
            "[Backup] listing items without a usable channel id"
        );
    }
    statuses
}

/// Parse the state blob embedded in the public live page.
///
/// `None` when the page carries no (readable) blob, `Some` with the
/// possibly empty list otherwise.
pub fn parse_listing_page(html: &str) -> Option<Vec<ChannelStatus>> {
    let start = INITIAL_STATE_RE.find(html)?.end();
    // The blob is followed by arbitrary script text; read one JSON value only
    let mut values = serde_json::Deserializer::from_str(&html[start..]).into_iter::<serde_json::Value>();
    let state = match values.next()? {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "[Backup] initial state blob is not valid JSON");
            return None;
        }
    };
    let items = state.pointer("/live/list")?.as_array()?;
    Some(statuses_from_items(items))
}

/// Parse the JSON listing endpoint (`{"result": bool, "list": [...]}`)
pub fn parse_listing_api(body: &str) -> Option<Vec<ChannelStatus>> {
    let payload: serde_json::Value = serde_json::from_str(body).ok()?;
    if payload.get("result").and_then(|r| r.as_bool()) == Some(false) {
        debug!(
            reason = payload.get("message").and_then(|m| m.as_str()).unwrap_or(""),
            "[Backup] listing API reported failure"
        );
        return None;
    }
    let items = payload.get("list")?.as_array()?;
    Some(statuses_from_items(items))
}

/// Build a status from the backup-shaped channel page
pub fn parse_channel_page(key: &ChannelKey, body: &str) -> ChannelStatus {
    let fields = RULES.apply(body);
    debug!(
        channel = %key,
        is_live = fields.is_live,
        signal = fields.matched_signal.unwrap_or("none"),
        "[Backup] parsed channel page"
    );

    ChannelStatus {
        is_live: fields.is_live,
        title: fields.title,
        viewer_count: fields.viewer_count,
        thumbnail_url: fields.thumbnail_url,
        nickname: fields.nickname,
        ..ChannelStatus::offline(key.clone(), StatusSource::Backup)
    }
}

struct CachedListing {
    fetched_at: Instant,
    statuses: Vec<ChannelStatus>,
}

/// Heavier backup strategy
pub struct BackupFetcher {
    client: reqwest::Client,
    page_base: String,
    listing_page_url: String,
    listing_api_url: String,
    headers: HeaderMap,
    cache_ttl: Duration,
    listing_cache: Mutex<Option<CachedListing>>,
}

impl BackupFetcher {
    pub fn new(config: &EngineConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: http::build_client(config)?,
            page_base: config.backup_page_base.clone(),
            listing_page_url: config.listing_page_url.clone(),
            listing_api_url: config.listing_api_url.clone(),
            headers: Self::build_headers(config)?,
            cache_ttl: config.listing_cache_ttl(),
            listing_cache: Mutex::new(None),
        })
    }

    fn build_headers(config: &EngineConfig) -> Result<HeaderMap, FetchError> {
        let header = |value: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| FetchError::Client(format!("invalid header value {:?}: {}", value, e)))
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header(&config.backup_user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, header(&config.accept_language)?);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        Ok(headers)
    }

    async fn fetch_page(&self, key: &ChannelKey) -> Result<String, FetchError> {
        let url = http::channel_url(&self.page_base, key)?;
        http::get_text(&self.client, url, self.headers.clone()).await
    }

    async fn get(&self, raw_url: &str, accept: &'static str) -> Result<String, FetchError> {
        let url = Url::parse(raw_url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw_url, e)))?;
        let mut headers = self.headers.clone();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        http::get_text(&self.client, url, headers).await
    }

    /// Live page state blob first, then the JSON endpoint
    async fn fetch_listing_uncached(&self) -> Option<Vec<ChannelStatus>> {
        match self.get(&self.listing_page_url, "text/html,*/*;q=0.8").await {
            Ok(html) => {
                if let Some(list) = parse_listing_page(&html) {
                    debug!(count = list.len(), "[Backup] listing from live page state");
                    return Some(list);
                }
                debug!("[Backup] live page carries no state blob, trying listing API");
            }
            Err(e) => warn!(error = %e, "[Backup] live page fetch failed"),
        }

        match self.get(&self.listing_api_url, "application/json").await {
            Ok(body) => {
                let parsed = parse_listing_api(&body);
                if parsed.is_none() {
                    warn!("[Backup] listing API returned an unreadable payload");
                }
                parsed
            }
            Err(e) => {
                warn!(error = %e, "[Backup] listing API fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl StatusFetcher for BackupFetcher {
    fn name(&self) -> &'static str {
        "backup-page-scrape"
    }

    fn source(&self) -> StatusSource {
        StatusSource::Backup
    }

    async fn fetch(&self, key: &ChannelKey) -> ChannelStatus {
        match self.fetch_page(key).await {
            Ok(body) => parse_channel_page(key, &body),
            Err(e) => {
                debug!(channel = %key, error = %e, "[Backup] fetch failed");
                ChannelStatus::failed(key.clone(), StatusSource::Backup, e.to_string())
            }
        }
    }
}

#[async_trait]
impl ActiveListing for BackupFetcher {
    async fn fetch_listing(&self) -> Listing {
        let mut cache = self.listing_cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.cache_ttl {
                debug!(count = cached.statuses.len(), "[Backup] serving cached listing");
                return Listing {
                    statuses: cached.statuses.clone(),
                    origin: ListingOrigin::Cached,
                };
            }
        }

        match self.fetch_listing_uncached().await {
            Some(statuses) => {
                info!(count = statuses.len(), "[Backup] active listing refreshed");
                *cache = Some(CachedListing {
                    fetched_at: Instant::now(),
                    statuses: statuses.clone(),
                });
                Listing {
                    statuses,
                    origin: ListingOrigin::Upstream,
                }
            }
            None => match cache.as_ref() {
                Some(stale) => {
                    warn!(
                        age_secs = stale.fetched_at.elapsed().as_secs(),
                        "[Backup] listing unavailable, serving stale cache"
                    );
                    Listing {
                        statuses: stale.statuses.clone(),
                        origin: ListingOrigin::Stale,
                    }
                }
                None => Listing {
                    statuses: Vec::new(),
                    origin: ListingOrigin::Unavailable,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ChannelKey {
        ChannelKey::parse("acron5").unwrap()
    }

    #[test]
    fn test_loose_live_markers() {
        for body in [
            r#"{"isLive": TRUE}"#,
            r#"<div class="player live-now"></div>"#,
            r#"<section data-live="true">"#,
            r#"{"broadcasting":true}"#,
        ] {
            assert!(parse_channel_page(&key(), body).is_live, "expected live for {}", body);
        }
    }

    #[test]
    fn test_no_offline_short_circuit() {
        let body = r#"{"isLive":false} <div class="live-wrap"></div>"#;
        assert!(parse_channel_page(&key(), body).is_live);
    }

    #[test]
    fn test_parse_miss_is_offline_without_error() {
        let status = parse_channel_page(&key(), "<html><title>가애 - PandaTV</title></html>");
        assert!(!status.is_live);
        assert!(status.error_message.is_none());
        assert_eq!(status.source, StatusSource::Backup);
        assert_eq!(status.title.as_deref(), Some("가애"));
    }

    #[test]
    fn test_nickname_from_og_title() {
        let body = r#"<meta content="월아" property="og:title">"#;
        assert_eq!(
            parse_channel_page(&key(), body).nickname.as_deref(),
            Some("월아")
        );
    }

    #[test]
    fn test_listing_page_blob() {
        let html = r#"<html><script>window.__INITIAL_STATE__ = {"live":{"list":[
            {"userId":"acron5","userNick":"가애","title":"노래; 수다","user":321,"thumbUrl":"https://t/1.jpg"},
            {"userId":"bad id","userNick":"x"},
            {"userNick":"missing id"},
            {"userId":"kiki0213"}
        ]}};</script></html>"#;
        let list = parse_listing_page(html).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].channel_key.as_str(), "acron5");
        assert!(list[0].is_live);
        assert_eq!(list[0].title.as_deref(), Some("노래; 수다"));
        assert_eq!(list[0].viewer_count, Some(321));
        assert_eq!(list[0].source, StatusSource::Backup);
        assert_eq!(list[1].channel_key.as_str(), "kiki0213");
        assert!(list[1].title.is_none());
    }

    #[test]
    fn test_listing_page_blob_followed_by_more_script() {
        let html = r#"<script>window.__INITIAL_STATE__={"live":{"list":[{"userId":"acron5"}]}};window.__NUXT__=1;</script>
            <script>var other = {"isLive": true};</script>"#;
        let list = parse_listing_page(html).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].channel_key.as_str(), "acron5");
    }

    #[test]
    fn test_listing_items_with_odd_field_types() {
        let body = r#"{"result":true,"list":[
            {"userId":"acron5","user":"1,234"},
            {"userId":"kiki0213","user":-1},
            {"userId":"sm5252","title":42,"userNick":null,"thumbUrl":{"x":1}},
            {"userId":12345},
            {"userId":null,"title":"no id"}
        ]}"#;
        let list = parse_listing_api(body).unwrap();
        let ids: Vec<&str> = list.iter().map(|s| s.channel_key.as_str()).collect();
        assert_eq!(ids, vec!["acron5", "kiki0213", "sm5252", "12345"]);
        assert!(list.iter().all(|s| s.is_live));
        assert_eq!(list[0].viewer_count, Some(1234));
        assert!(list[1].viewer_count.is_none());
        assert!(list[2].title.is_none());
        assert!(list[2].nickname.is_none());
        assert!(list[2].thumbnail_url.is_none());
    }

    #[test]
    fn test_malformed_bodies_never_panic() {
        let long = "<div class=\"x\">".repeat(10_000);
        let bodies: [&str; 8] = [
            "",
            "   ",
            "\u{0}\u{fffd}",
            "<title>",
            r#"{"isLive":"#,
            r#""userNick":"\"#,
            "<meta content=\"\" property=\"og:title\">",
            long.as_str(),
        ];
        for body in bodies {
            let status = parse_channel_page(&key(), body);
            assert!(!status.is_live);
            assert!(status.error_message.is_none());
            assert!(parse_listing_page(body).is_none());
            assert!(parse_listing_api(body).is_none());
        }
    }

    #[test]
    fn test_listing_page_without_blob() {
        assert!(parse_listing_page("<html><div id=app></div></html>").is_none());
        assert!(parse_listing_page("<script>window.__INITIAL_STATE__ = {not json};</script>").is_none());
    }

    #[test]
    fn test_listing_page_with_empty_list() {
        let html = r#"<script>window.__INITIAL_STATE__={"live":{"list":[]}}</script>"#;
        assert_eq!(parse_listing_page(html).map(|l| l.len()), Some(0));
    }

    #[test]
    fn test_listing_api() {
        let body = r#"{"result":true,"list":[{"userId":"sm5252","userNick":"손밍","title":"t","user":12,"thumbUrl":""}]}"#;
        let list = parse_listing_api(body).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].nickname.as_deref(), Some("손밍"));
        assert!(list[0].thumbnail_url.is_none());
    }

    #[test]
    fn test_listing_api_failure_payloads() {
        assert!(parse_listing_api(r#"{"result":false,"message":"denied"}"#).is_none());
        assert!(parse_listing_api("<html>").is_none());
        assert!(parse_listing_api(r#"{"result":true}"#).is_none());
    }
}
