// Status fetchers - two independent acquisition strategies and the router
//
// - Primary: channel page, strict offline-first extraction, cache hint
// - Backup: alternate page shape with loose heuristics, plus the
//   platform-wide live listing
//
// The AdaptiveRouter picks the strategy per call from recent failure
// counters and falls back to the other one on failure.

mod backup;
mod diagnostics;
mod primary;
pub mod router;
mod signals;
mod traits;

pub use backup::{parse_listing_api, parse_listing_page, BackupFetcher};
pub use diagnostics::{classify_failure, FailureKind};
pub use primary::PrimaryFetcher;
pub use router::{
    AdaptiveRouter, RouterSnapshot, RouterState, BACKUP_FAILURE_THRESHOLD,
    PRIMARY_FAILURE_THRESHOLD,
};
pub use traits::{ActiveListing, Listing, ListingOrigin, Resolver, StatusFetcher};
