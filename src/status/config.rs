// Engine configuration: upstream endpoints, request identity, pacing

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::errors::ConfigError;

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "LIVE_STATUS_CONFIG";
/// Environment variable overriding the proxy setting
pub const PROXY_ENV: &str = "LIVE_STATUS_PROXY";

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";

/// Configuration for fetchers, router and batch runner
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Channel page base for the primary strategy (`<base>/<key>`)
    pub primary_page_base: String,
    /// Channel page base for the backup strategy (`<base>/<key>`)
    pub backup_page_base: String,
    /// Public "currently live" page embedding the state blob
    pub listing_page_url: String,
    /// Alternate JSON listing endpoint
    pub listing_api_url: String,
    pub user_agent: String,
    pub backup_user_agent: String,
    pub accept_language: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Shared cache lifetime hinted on primary requests
    pub cache_max_age_secs: u64,
    /// HTTP or SOCKS5 proxy URL
    pub proxy: Option<String>,
    /// Resolutions in flight per batch chunk
    pub concurrency: usize,
    /// Delay between batch chunks in milliseconds
    pub pacing_ms: u64,
    pub listing_cache_ttl_secs: u64,
    /// Upper bound on keys resolved one by one when the listing is empty
    pub listing_fallback_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_page_base: "https://www.pandalive.co.kr/channel".to_string(),
            backup_page_base: "https://www.pandalive.co.kr".to_string(),
            listing_page_url: "https://www.pandalive.co.kr/live".to_string(),
            listing_api_url: "https://api.pandalive.co.kr/v1/live".to_string(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            backup_user_agent: MOBILE_USER_AGENT.to_string(),
            accept_language: "ko-KR,ko;q=0.9,en;q=0.8".to_string(),
            timeout_ms: 10_000,
            cache_max_age_secs: 60,
            proxy: None,
            concurrency: 3,
            pacing_ms: 300,
            listing_cache_ttl_secs: 30,
            listing_fallback_cap: 50,
        }
    }
}

impl EngineConfig {
    pub fn with_primary_page_base(mut self, base: impl Into<String>) -> Self {
        self.primary_page_base = base.into();
        self
    }

    pub fn with_backup_page_base(mut self, base: impl Into<String>) -> Self {
        self.backup_page_base = base.into();
        self
    }

    pub fn with_listing_urls(mut self, page: impl Into<String>, api: impl Into<String>) -> Self {
        self.listing_page_url = page.into();
        self.listing_api_url = api.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing_ms = u64::try_from(pacing.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_listing_cache_ttl(mut self, ttl: Duration) -> Self {
        self.listing_cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_listing_fallback_cap(mut self, cap: usize) -> Self {
        self.listing_fallback_cap = cap;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn listing_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_cache_ttl_secs)
    }

    /// Load configuration.
    ///
    /// An explicit path (or `$LIVE_STATUS_CONFIG`) must exist. Without one,
    /// `<config dir>/live-status/config.toml` is used when present and
    /// defaults otherwise. `$LIVE_STATUS_PROXY` overrides `proxy`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                Self::from_file(&path)?
            }
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        if let Ok(proxy) = std::env::var(PROXY_ENV) {
            if !proxy.trim().is_empty() {
                config.proxy = Some(proxy.trim().to_string());
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms",
                message: "must be positive".to_string(),
            });
        }
        for (field, value) in [
            ("primary_page_base", &self.primary_page_base),
            ("backup_page_base", &self.backup_page_base),
            ("listing_page_url", &self.listing_page_url),
            ("listing_api_url", &self.listing_api_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("{}: {}", value, e),
                });
            }
        }
        Ok(())
    }
}

/// `<config dir>/live-status/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("live-status").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.cache_max_age_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml("concurrency = 5\npacing_ms = 100\n").unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.pacing(), Duration::from_millis(100));
        assert_eq!(config.listing_fallback_cap, 50);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = EngineConfig::default().with_concurrency(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "concurrency", .. })
        ));
    }

    #[test]
    fn test_huge_durations_saturate() {
        let config = EngineConfig::default()
            .with_timeout(Duration::MAX)
            .with_pacing(Duration::MAX);
        assert_eq!(config.timeout_ms, u64::MAX);
        assert_eq!(config.pacing_ms, u64::MAX);

        let config = EngineConfig::default().with_timeout(Duration::from_secs(90));
        assert_eq!(config.timeout_ms, 90_000);
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let config = EngineConfig::default().with_primary_page_base("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_ms = 2500").unwrap();
        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/live-status.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "concurrency = \"three\"").unwrap();
        let result = EngineConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
