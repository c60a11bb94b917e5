// Batch resolution with bounded concurrency and inter-chunk pacing

use futures::future::join_all;
use std::time::Duration;
use tracing::debug;

use super::config::EngineConfig;
use super::fetchers::Resolver;
use super::models::{ChannelKey, ChannelStatus};

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_PACING: Duration = Duration::from_millis(300);

/// Resolves a list of keys in chunks of `concurrency`, awaiting every call
/// of a chunk before starting the next and pausing `pacing` in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchResolver {
    concurrency: usize,
    pacing: Duration,
}

impl BatchResolver {
    /// A concurrency of 0 is treated as 1.
    pub fn new(concurrency: usize, pacing: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            pacing,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.concurrency, config.pacing())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// One status per key, in input order.
    pub async fn resolve_batch<R>(&self, resolver: &R, keys: &[ChannelKey]) -> Vec<ChannelStatus>
    where
        R: Resolver + ?Sized,
    {
        let mut results = Vec::with_capacity(keys.len());
        let chunk_count = (keys.len() + self.concurrency - 1) / self.concurrency;

        for (index, chunk) in keys.chunks(self.concurrency).enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            debug!(
                chunk = index + 1,
                of = chunk_count,
                size = chunk.len(),
                "[Batch] resolving chunk"
            );
            // join_all yields in input order regardless of completion order
            let statuses = join_all(chunk.iter().map(|key| resolver.resolve(key))).await;
            results.extend(statuses);
        }

        results
    }
}

impl Default for BatchResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, DEFAULT_PACING)
    }
}
