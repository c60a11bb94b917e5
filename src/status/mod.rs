// Live status module - resolves whether roster channels are broadcasting

pub mod batch;
pub mod channel;
pub mod config;
pub mod errors;
pub mod fetchers;
pub mod http;
pub mod models;
pub mod service;

pub use batch::BatchResolver;
pub use channel::normalize;
pub use config::EngineConfig;
pub use errors::{ConfigError, FetchError};
pub use fetchers::{
    ActiveListing, AdaptiveRouter, BackupFetcher, FailureKind, Listing, ListingOrigin,
    PrimaryFetcher, Resolver, RouterSnapshot, StatusFetcher,
};
pub use models::{ChannelKey, ChannelStatus, Outcome, ReferenceStatus, StatusSource};
pub use service::LiveStatusService;
