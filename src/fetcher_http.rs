//! HTTP-based page fetcher using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::browser::DESKTOP_USER_AGENT;
use crate::fetcher::PageFetcher;
use crate::Result;

/// A page fetcher that uses plain HTTP requests via reqwest.
///
/// Suitable for server-rendered pages. Non-success status codes are
/// reported as errors.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a desktop browser user agent and the given
    /// request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Creates an `HttpFetcher` with a custom reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        debug!("Fetched {} ({})", url, response.status());
        let html = response.text().await?;
        Ok(html)
    }
}
