//! HTTP fetcher using wreq for TLS fingerprint emulation.

use super::{classify_status, FetchError, FetchSettings, FetchedPage, Fetcher};
use crate::platform::Region;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;
use url::Url;
use wreq::Client;
use wreq_util::Emulation;

/// Fetcher with browser impersonation.
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Creates a fetcher with the given settings.
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout);

        if let Some(proxy_url) = &settings.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self { client, user_agent: settings.user_agent.clone() })
    }
}

fn accept_language(url: &str) -> &'static str {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(Region::from_host))
        .unwrap_or_default()
        .accept_language()
}

fn unreachable(err: &wreq::Error) -> FetchError {
    let message = if err.is_timeout() { "request timed out".to_string() } else { err.to_string() };
    FetchError::Unreachable { message }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("User-Agent", self.user_agent.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", accept_language(url))
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| unreachable(&e))?;

        let status = response.status().as_u16();
        debug!("Response status: {}", status);

        classify_status(status)?;

        let body = response.text().await.map_err(|e| unreachable(&e))?;
        Ok(FetchedPage { status, body })
    }
}
