// Primary fetcher - channel page with strict, offline-first extraction
//
// One GET per channel against the canonical channel page. Requests carry a
// desktop browser identity and a short shared-cache hint so that callers
// polling the same roster within a minute can be served by intermediate
// caches instead of the origin.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use tracing::debug;

use super::signals::{self, FieldExtractor, LivenessRules, PageRules, Signal, SignalSet};
use super::traits::StatusFetcher;
use crate::status::config::EngineConfig;
use crate::status::errors::FetchError;
use crate::status::http;
use crate::status::models::{ChannelKey, ChannelStatus, StatusSource};

lazy_static::lazy_static! {
    static ref RULES: PageRules = PageRules {
        liveness: LivenessRules::strict(
            SignalSet::new(vec![
                Signal::new("is-live-false", Regex::new(r#""isLive"\s*:\s*false"#).unwrap()),
                Signal::new(
                    "live-status-off",
                    Regex::new(r#""(?:liveStatus|broadcastStatus)"\s*:\s*"(?i:off|end|ended|wait|ready)""#).unwrap(),
                ),
                Signal::new(
                    "offline-css",
                    Regex::new(r#"class\s*=\s*"[^"]*\b(?:offline|is-offline|live-end|broadcast-end)\b[^"]*""#).unwrap(),
                ),
                Signal::new(
                    "ended-phrase",
                    Regex::new(r"방송이?\s*종료|방송\s*준비\s*중|(?i:broadcast\s+(?:has\s+)?ended|stream\s+is\s+offline)").unwrap(),
                ),
                Signal::new(
                    "scheduled-phrase",
                    Regex::new(r"방송\s*예정|(?i:scheduled\s+broadcast)").unwrap(),
                ),
            ]),
            SignalSet::new(vec![
                Signal::new("is-live-true", Regex::new(r#""isLive"\s*:\s*true"#).unwrap()),
                Signal::new(
                    "live-status-on",
                    Regex::new(r#""(?:liveStatus|broadcastStatus)"\s*:\s*"(?i:on|live)""#).unwrap(),
                ),
                Signal::new("broadcasting-true", Regex::new(r#""broadcasting"\s*:\s*true"#).unwrap()),
                Signal::new("data-live", Regex::new(r#"data-live\s*=\s*"true""#).unwrap()),
                Signal::new(
                    "on-air-css",
                    Regex::new(r#"class\s*=\s*"[^"]*\b(?:live-badge|on-air|onair)\b[^"]*""#).unwrap(),
                ),
            ]),
        ),
        title: vec![
            FieldExtractor::new(
                "og-title",
                Regex::new(r#"(?i)<meta[^>]+property\s*=\s*"og:title"[^>]*?content\s*=\s*"([^"]*)""#).unwrap(),
                signals::text,
            ),
            FieldExtractor::new(
                "og-title-reversed",
                Regex::new(r#"(?i)<meta[^>]+content\s*=\s*"([^"]*)"[^>]*?property\s*=\s*"og:title""#).unwrap(),
                signals::text,
            ),
            FieldExtractor::new(
                "title-element",
                Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap(),
                signals::page_title,
            ),
        ],
        viewer_count: vec![
            FieldExtractor::new(
                "viewer-count-field",
                Regex::new(r#""(?:viewerCount|viewer_count|userCount)"\s*:\s*"?([\d,]+)"#).unwrap(),
                signals::count,
            ),
            FieldExtractor::new(
                "watching-ko",
                Regex::new(r"([\d,]+)\s*명\s*(?:이\s*)?시청").unwrap(),
                signals::count,
            ),
            FieldExtractor::new(
                "watching-en",
                Regex::new(r"(?i)([\d,]+)\s+(?:watching|viewers)").unwrap(),
                signals::count,
            ),
        ],
        thumbnail: vec![
            FieldExtractor::new(
                "og-image",
                Regex::new(r#"(?i)<meta[^>]+property\s*=\s*"og:image"[^>]*?content\s*=\s*"([^"]*)""#).unwrap(),
                signals::text,
            ),
            FieldExtractor::new(
                "og-image-reversed",
                Regex::new(r#"(?i)<meta[^>]+content\s*=\s*"([^"]*)"[^>]*?property\s*=\s*"og:image""#).unwrap(),
                signals::text,
            ),
            FieldExtractor::new(
                "thumb-field",
                Regex::new(r#""(?:thumbUrl|thumbnailUrl|ivsThumbnail)"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap(),
                signals::json_string,
            ),
        ],
        nickname: vec![FieldExtractor::new(
            "user-nick-field",
            Regex::new(r#""userNick"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap(),
            signals::json_string,
        )],
    };
}

/// Lightweight channel-page strategy
pub struct PrimaryFetcher {
    client: reqwest::Client,
    page_base: String,
    headers: HeaderMap,
}

impl PrimaryFetcher {
    pub fn new(config: &EngineConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: http::build_client(config)?,
            page_base: config.primary_page_base.clone(),
            headers: Self::build_headers(config)?,
        })
    }

    fn build_headers(config: &EngineConfig) -> Result<HeaderMap, FetchError> {
        let header = |value: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| FetchError::Client(format!("invalid header value {:?}: {}", value, e)))
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header(&config.user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, header(&config.accept_language)?);
        headers.insert(
            CACHE_CONTROL,
            header(&format!("max-age={}", config.cache_max_age_secs))?,
        );
        Ok(headers)
    }

    async fn fetch_page(&self, key: &ChannelKey) -> Result<String, FetchError> {
        let url = http::channel_url(&self.page_base, key)?;
        http::get_text(&self.client, url, self.headers.clone()).await
    }
}

/// Build a status from a fetched channel page
pub fn parse_channel_page(key: &ChannelKey, body: &str) -> ChannelStatus {
    let fields = RULES.apply(body);
    debug!(
        channel = %key,
        is_live = fields.is_live,
        signal = fields.matched_signal.unwrap_or("none"),
        "[Primary] parsed channel page"
    );

    ChannelStatus {
        is_live: fields.is_live,
        title: fields.title,
        viewer_count: fields.viewer_count,
        thumbnail_url: fields.thumbnail_url,
        nickname: fields.nickname,
        ..ChannelStatus::offline(key.clone(), StatusSource::Primary)
    }
}

#[async_trait]
impl StatusFetcher for PrimaryFetcher {
    fn name(&self) -> &'static str {
        "primary-channel-page"
    }

    fn source(&self) -> StatusSource {
        StatusSource::Primary
    }

    async fn fetch(&self, key: &ChannelKey) -> ChannelStatus {
        match self.fetch_page(key).await {
            Ok(body) => parse_channel_page(key, &body),
            Err(e) => {
                debug!(channel = %key, error = %e, "[Primary] fetch failed");
                ChannelStatus::failed(key.clone(), StatusSource::Primary, e.to_string())
            }
        }
    }
}
