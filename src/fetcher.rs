//! Page fetcher abstraction for retrieving HTML content.

use async_trait::async_trait;

use crate::Result;

/// Trait for fetching the full HTML content of a URL.
///
/// All configuration (user agent, timeouts) is set at construction time;
/// `fetch` is a simple URL-in, HTML-out interface.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the HTML content of the given URL.
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::PageFetcher;
    use crate::{Result, ScrapeError};

    /// Serves canned pages; unknown URLs fail like an unreachable host.
    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    impl StaticFetcher {
        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScrapeError::Other(format!("connection refused: {}", url)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::StaticFetcher;
    use super::*;

    #[test]
    fn test_static_fetcher() {
        let fetcher = StaticFetcher::default().with_page("https://example.com/", "<p>hi</p>");
        let html = tokio_test::block_on(fetcher.fetch("https://example.com/")).unwrap();
        assert_eq!(html, "<p>hi</p>");

        let err = tokio_test::block_on(fetcher.fetch("https://other.example.com/")).unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
