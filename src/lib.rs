pub mod status;

pub use status::{
    AdaptiveRouter, ChannelKey, ChannelStatus, EngineConfig, LiveStatusService, Outcome,
    ReferenceStatus, RouterSnapshot, StatusSource,
};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber (`RUST_LOG` overrides `default_filter`)
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // A subscriber may already be installed by an embedding application
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
