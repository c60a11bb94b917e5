// Adaptive router - strategy selection with fallback and failure counters
//
// Strategy:
// 1. Prefer Primary while it is below its failure threshold
// 2. Prefer Backup once Primary crossed its threshold and Backup has not
// 3. With both over threshold, prefer whichever succeeded last
// 4. On failure, try the other strategy once for the same call
//
// Counters reset on success, so a recovered Primary takes traffic back on
// the next call where Backup stumbles. There is no timed half-open probe.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::backup::BackupFetcher;
use super::diagnostics::{classify_failure, FailureKind};
use super::primary::PrimaryFetcher;
use super::traits::{ActiveListing, ListingOrigin, Resolver, StatusFetcher};
use crate::status::batch::BatchResolver;
use crate::status::config::EngineConfig;
use crate::status::errors::FetchError;
use crate::status::models::{ChannelKey, ChannelStatus, StatusSource};

pub const PRIMARY_FAILURE_THRESHOLD: u32 = 3;
pub const BACKUP_FAILURE_THRESHOLD: u32 = 3;

const DEFAULT_LISTING_FALLBACK_CAP: usize = 50;

/// Routing memory shared by every resolution of one router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterState {
    pub last_successful: StatusSource,
    pub primary_failures: u32,
    pub backup_failures: u32,
    pub last_primary_failure: Option<FailureKind>,
    pub last_backup_failure: Option<FailureKind>,
}

impl Default for RouterState {
    fn default() -> Self {
        Self {
            last_successful: StatusSource::Primary,
            primary_failures: 0,
            backup_failures: 0,
            last_primary_failure: None,
            last_backup_failure: None,
        }
    }
}

impl RouterState {
    /// Strategy to try first
    pub fn preferred(&self) -> StatusSource {
        let primary_exhausted = self.primary_failures >= PRIMARY_FAILURE_THRESHOLD;
        let backup_exhausted = self.backup_failures >= BACKUP_FAILURE_THRESHOLD;

        match (primary_exhausted, backup_exhausted) {
            (false, _) => StatusSource::Primary,
            (true, false) => StatusSource::Backup,
            (true, true) => self.last_successful,
        }
    }

    pub fn failures(&self, source: StatusSource) -> u32 {
        match source {
            StatusSource::Primary => self.primary_failures,
            StatusSource::Backup => self.backup_failures,
        }
    }

    /// Apply one attempt's outcome; returns the strategy's new counter.
    pub fn record(&mut self, source: StatusSource, failure: Option<FailureKind>) -> u32 {
        let (counter, last_failure) = match source {
            StatusSource::Primary => (&mut self.primary_failures, &mut self.last_primary_failure),
            StatusSource::Backup => (&mut self.backup_failures, &mut self.last_backup_failure),
        };

        match failure {
            Some(kind) => {
                *counter = counter.saturating_add(1);
                *last_failure = Some(kind);
            }
            None => {
                *counter = 0;
                self.last_successful = source;
            }
        }

        self.failures(source)
    }
}

/// Point-in-time view of the router, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterSnapshot {
    pub last_successful: StatusSource,
    pub preferred: StatusSource,
    pub primary_failures: u32,
    pub backup_failures: u32,
    pub primary_available: bool,
    pub backup_available: bool,
    pub last_primary_failure: Option<FailureKind>,
    pub last_backup_failure: Option<FailureKind>,
}

impl From<&RouterState> for RouterSnapshot {
    fn from(state: &RouterState) -> Self {
        Self {
            last_successful: state.last_successful,
            preferred: state.preferred(),
            primary_failures: state.primary_failures,
            backup_failures: state.backup_failures,
            primary_available: state.primary_failures < PRIMARY_FAILURE_THRESHOLD,
            backup_available: state.backup_failures < BACKUP_FAILURE_THRESHOLD,
            last_primary_failure: state.last_primary_failure,
            last_backup_failure: state.last_backup_failure,
        }
    }
}

/// Orchestrator over the two fetch strategies.
///
/// Create one per process and share it (`Arc`); tests build as many
/// independent instances as they need.
pub struct AdaptiveRouter {
    primary: Arc<dyn StatusFetcher>,
    backup: Arc<dyn StatusFetcher>,
    listing: Arc<dyn ActiveListing>,
    state: Mutex<RouterState>,
    batch: BatchResolver,
    listing_fallback_cap: usize,
}

impl AdaptiveRouter {
    pub fn new(
        primary: Arc<dyn StatusFetcher>,
        backup: Arc<dyn StatusFetcher>,
        listing: Arc<dyn ActiveListing>,
    ) -> Self {
        Self {
            primary,
            backup,
            listing,
            state: Mutex::new(RouterState::default()),
            batch: BatchResolver::default(),
            listing_fallback_cap: DEFAULT_LISTING_FALLBACK_CAP,
        }
    }

    /// Production wiring: HTTP fetchers built from `config`
    pub fn from_config(config: &EngineConfig) -> Result<Self, FetchError> {
        let primary = Arc::new(PrimaryFetcher::new(config)?);
        let backup = Arc::new(BackupFetcher::new(config)?);
        Ok(Self::new(primary, backup.clone(), backup)
            .with_batch(BatchResolver::from_config(config))
            .with_listing_fallback_cap(config.listing_fallback_cap))
    }

    pub fn with_batch(mut self, batch: BatchResolver) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_listing_fallback_cap(mut self, cap: usize) -> Self {
        self.listing_fallback_cap = cap;
        self
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        // Counters stay meaningful even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fetcher(&self, source: StatusSource) -> &dyn StatusFetcher {
        match source {
            StatusSource::Primary => self.primary.as_ref(),
            StatusSource::Backup => self.backup.as_ref(),
        }
    }

    pub fn preferred_strategy(&self) -> StatusSource {
        self.state().preferred()
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot::from(&*self.state())
    }

    /// Back to the initial state (Primary preferred, counters at zero)
    pub fn reset(&self) {
        *self.state() = RouterState::default();
        info!("[Router] state reset");
    }

    fn record(&self, source: StatusSource, status: &ChannelStatus) -> (u32, Option<FailureKind>) {
        let failure = status.error_message.as_deref().map(classify_failure);
        let count = self.state().record(source, failure);
        (count, failure)
    }

    /// One strategy, counters updated
    async fn attempt(&self, source: StatusSource, key: &ChannelKey) -> ChannelStatus {
        let fetcher = self.fetcher(source);
        debug!(channel = %key, fetcher = fetcher.name(), "[Router] trying {}", source);

        let status = fetcher.fetch(key).await;
        let (failures, kind) = self.record(source, &status);

        if let Some(kind) = kind {
            warn!(
                channel = %key,
                fetcher = fetcher.name(),
                failures,
                kind = ?kind,
                transient = kind.is_transient(),
                error = status.error_message.as_deref().unwrap_or(""),
                "[Router] {} failed",
                source
            );
        }
        status
    }

    /// One strategy, bypassing routing and counters (diagnostics)
    pub async fn fetch_with(&self, source: StatusSource, key: &ChannelKey) -> ChannelStatus {
        self.fetcher(source).fetch(key).await
    }

    /// Resolve one channel: preferred strategy, then the other on failure.
    pub async fn resolve(&self, key: &ChannelKey) -> ChannelStatus {
        let first = self.preferred_strategy();
        let status = self.attempt(first, key).await;
        if !status.is_error() {
            return status;
        }

        let fallback = first.other();
        info!(channel = %key, "[Router] {} failed, falling back to {}", first, fallback);
        let status = self.attempt(fallback, key).await;
        if status.is_error() {
            error!(channel = %key, "[Router] all strategies failed");
        } else {
            info!(channel = %key, "[Router] fallback {} succeeded", fallback);
        }
        status
    }

    /// Resolve many channels with bounded concurrency, input order kept
    pub async fn resolve_all(&self, keys: &[ChannelKey]) -> Vec<ChannelStatus> {
        self.batch.resolve_batch(self, keys).await
    }

    /// Every channel currently live.
    ///
    /// Uses the platform listing; when it yields nothing, resolves at most
    /// `listing_fallback_cap` of `fallback_keys` one by one and keeps the
    /// live ones.
    pub async fn resolve_active_listing(&self, fallback_keys: &[ChannelKey]) -> Vec<ChannelStatus> {
        let listing = self.listing.fetch_listing().await;
        if !listing.statuses.is_empty() {
            // Only a fresh upstream answer says anything about Backup health
            if listing.origin == ListingOrigin::Upstream {
                self.state().record(StatusSource::Backup, None);
            } else {
                debug!(origin = ?listing.origin, "[Router] listing served from cache");
            }
            return listing.statuses;
        }

        if fallback_keys.is_empty() {
            return Vec::new();
        }

        let capped = if fallback_keys.len() > self.listing_fallback_cap {
            warn!(
                requested = fallback_keys.len(),
                cap = self.listing_fallback_cap,
                "[Router] listing fallback capped"
            );
            &fallback_keys[..self.listing_fallback_cap]
        } else {
            fallback_keys
        };

        info!(count = capped.len(), "[Router] listing empty, resolving channels individually");
        self.resolve_all(capped)
            .await
            .into_iter()
            .filter(|status| status.is_live)
            .collect()
    }
}

#[async_trait::async_trait]
impl Resolver for AdaptiveRouter {
    async fn resolve(&self, key: &ChannelKey) -> ChannelStatus {
        AdaptiveRouter::resolve(self, key).await
    }
}
