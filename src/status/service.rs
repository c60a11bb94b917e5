// Entry points for collaborators (roster UI, periodic refresh jobs)
//
// All operations return plain data. Unrecognized references come back
// with `status: None`; every other failure is inside the ChannelStatus.

use std::sync::Arc;
use tracing::debug;

use super::config::EngineConfig;
use super::errors::FetchError;
use super::fetchers::AdaptiveRouter;
use super::models::{ChannelKey, ChannelStatus, ReferenceStatus};

#[derive(Clone)]
pub struct LiveStatusService {
    router: Arc<AdaptiveRouter>,
}

impl LiveStatusService {
    pub fn new(router: Arc<AdaptiveRouter>) -> Self {
        Self { router }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, FetchError> {
        Ok(Self::new(Arc::new(AdaptiveRouter::from_config(config)?)))
    }

    pub fn router(&self) -> &Arc<AdaptiveRouter> {
        &self.router
    }

    /// Resolve one reference; `None` if it is not a channel reference
    pub async fn check(&self, reference: &str) -> Option<ChannelStatus> {
        let key = ChannelKey::parse(reference)?;
        Some(self.router.resolve(&key).await)
    }

    /// Resolve many references with bounded concurrency, input order kept
    pub async fn check_many<S: AsRef<str>>(&self, references: &[S]) -> Vec<ReferenceStatus> {
        let parsed: Vec<Option<ChannelKey>> = references
            .iter()
            .map(|r| ChannelKey::parse(r.as_ref()))
            .collect();
        let keys: Vec<ChannelKey> = parsed.iter().flatten().cloned().collect();
        debug!(
            references = references.len(),
            valid = keys.len(),
            "[Service] resolving roster"
        );

        let mut statuses = self.router.resolve_all(&keys).await.into_iter();

        references
            .iter()
            .zip(parsed)
            .map(|(reference, key)| ReferenceStatus {
                reference: reference.as_ref().to_string(),
                status: key.and_then(|_| statuses.next()),
            })
            .collect()
    }

    /// Channels currently live; `roster` bounds the per-channel fallback
    /// used when the platform listing yields nothing.
    pub async fn active_listing<S: AsRef<str>>(&self, roster: &[S]) -> Vec<ChannelStatus> {
        let keys: Vec<ChannelKey> = roster
            .iter()
            .filter_map(|r| ChannelKey::parse(r.as_ref()))
            .collect();
        self.router.resolve_active_listing(&keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::batch::BatchResolver;
    use crate::status::fetchers::{ActiveListing, Listing, ListingOrigin, StatusFetcher};
    use crate::status::models::StatusSource;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Live when the key starts with "live", offline otherwise
    struct PrefixFetcher(StatusSource);

    #[async_trait]
    impl StatusFetcher for PrefixFetcher {
        fn name(&self) -> &'static str {
            "prefix"
        }

        fn source(&self) -> StatusSource {
            self.0
        }

        async fn fetch(&self, key: &ChannelKey) -> ChannelStatus {
            if key.as_str().starts_with("live") {
                ChannelStatus::live(key.clone(), self.0)
            } else {
                ChannelStatus::offline(key.clone(), self.0)
            }
        }
    }

    struct EmptyListing;

    #[async_trait]
    impl ActiveListing for EmptyListing {
        async fn fetch_listing(&self) -> Listing {
            Listing {
                statuses: Vec::new(),
                origin: ListingOrigin::Upstream,
            }
        }
    }

    fn service() -> LiveStatusService {
        let router = AdaptiveRouter::new(
            Arc::new(PrefixFetcher(StatusSource::Primary)),
            Arc::new(PrefixFetcher(StatusSource::Backup)),
            Arc::new(EmptyListing),
        )
        .with_batch(BatchResolver::new(2, Duration::ZERO));
        LiveStatusService::new(Arc::new(router))
    }

    #[tokio::test]
    async fn test_check_url_reference() {
        let status = service()
            .check("https://www.pandalive.co.kr/channel/live_one")
            .await
            .unwrap();
        assert!(status.is_live);
        assert_eq!(status.channel_key.as_str(), "live_one");
    }

    #[tokio::test]
    async fn test_check_invalid_reference() {
        assert!(service().check("https://example.com/x").await.is_none());
    }

    #[tokio::test]
    async fn test_check_many_keeps_positions() {
        let refs = ["live_a", "not valid!", "b", "https://pandalive.co.kr/live_c"];
        let results = service().check_many(&refs).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].reference, "live_a");
        assert!(results[0].status.as_ref().unwrap().is_live);
        assert!(results[1].status.is_none());
        let b = results[2].status.as_ref().unwrap();
        assert_eq!(b.channel_key.as_str(), "b");
        assert!(!b.is_live);
        assert_eq!(
            results[3].status.as_ref().unwrap().channel_key.as_str(),
            "live_c"
        );
    }

    #[tokio::test]
    async fn test_active_listing_falls_back_to_roster() {
        let live = service()
            .active_listing(&["live_x", "y", "bad ref", "live_z"])
            .await;
        let ids: Vec<&str> = live.iter().map(|s| s.channel_key.as_str()).collect();
        assert_eq!(ids, vec!["live_x", "live_z"]);
    }
}
