// Fetcher traits shared by both strategies and the router

use async_trait::async_trait;

use crate::status::models::{ChannelKey, ChannelStatus, StatusSource};

/// One acquisition strategy for a single channel.
///
/// `fetch` never fails: transport errors, timeouts and non-2xx answers are
/// reported through `ChannelStatus::error_message`.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Name of the fetcher (for logging)
    fn name(&self) -> &'static str;

    /// Strategy this fetcher implements
    fn source(&self) -> StatusSource;

    async fn fetch(&self, key: &ChannelKey) -> ChannelStatus;
}

/// Where a listing answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOrigin {
    /// Fetched from the platform during this call
    Upstream,
    /// Served from a cache entry still within its TTL
    Cached,
    /// Every listing surface failed; an expired cache entry was served
    Stale,
    /// Every listing surface failed and nothing was cached
    Unavailable,
}

/// Listing answer plus its provenance
#[derive(Debug, Clone)]
pub struct Listing {
    pub statuses: Vec<ChannelStatus>,
    pub origin: ListingOrigin,
}

/// Platform-wide "currently live" listing.
///
/// An empty list means either nobody is live or the listing could not be
/// read; there is no per-item shape to carry an error. `fetch_listing`
/// tells the two apart.
#[async_trait]
pub trait ActiveListing: Send + Sync {
    async fn fetch_listing(&self) -> Listing;

    async fn fetch_active_listing(&self) -> Vec<ChannelStatus> {
        self.fetch_listing().await.statuses
    }
}

/// Resolves one channel, whatever the strategy
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, key: &ChannelKey) -> ChannelStatus;
}
