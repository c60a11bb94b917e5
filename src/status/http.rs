// Helper functions shared by the fetcher implementations

use reqwest::header::HeaderMap;
use tracing::debug;
use url::Url;

use super::config::EngineConfig;
use super::errors::FetchError;
use super::models::ChannelKey;

/// Build an HTTP client with the configured timeout and optional proxy.
pub fn build_client(config: &EngineConfig) -> Result<reqwest::Client, FetchError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.timeout());

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| FetchError::Client(format!("invalid proxy {}: {}", proxy_url, e)))?;
        debug!(proxy = proxy_url, "Using proxy for upstream requests");
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

/// `<base>/<key>` as a validated URL
pub fn channel_url(base: &str, key: &ChannelKey) -> Result<Url, FetchError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), key.as_str());
    Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))
}

/// GET a document and return its body as text.
///
/// Non-2xx statuses map to `FetchError::Http`, transport failures and
/// timeouts to their respective variants.
pub async fn get_text(
    client: &reqwest::Client,
    url: Url,
    headers: HeaderMap,
) -> Result<String, FetchError> {
    debug!(url = %url, "GET");
    let response = client.get(url.clone()).headers(headers).send().await?;

    let status = response.status();
    if !status.is_success() {
        debug!(url = %url, status = status.as_u16(), "Upstream rejected request");
        return Err(FetchError::Http {
            status: status.as_u16(),
        });
    }

    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url_joins_without_double_slash() {
        let key = ChannelKey::parse("rina").unwrap();
        let url = channel_url("https://www.pandalive.co.kr/channel/", &key).unwrap();
        assert_eq!(url.as_str(), "https://www.pandalive.co.kr/channel/rina");
    }

    #[test]
    fn test_channel_url_rejects_bad_base() {
        let key = ChannelKey::parse("rina").unwrap();
        assert!(matches!(
            channel_url("no scheme here", &key),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_invalid_proxy_is_client_error() {
        let config = EngineConfig::default().with_proxy(Some("gopher://proxy.local:1080".to_string()));
        assert!(matches!(build_client(&config), Err(FetchError::Client(_))));
    }
}
