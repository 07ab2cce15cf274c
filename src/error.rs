//! Error types for the scraping service.

use thiserror::Error;

/// Result type alias for scraping operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Errors that can occur while driving a browser, fetching or parsing pages.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse a page or a selector.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Headless browser failure.
    #[error("Browser error: {0}")]
    Browser(String),

    /// The search engine home page could not be loaded.
    #[error("Failed to access search engine: {0}")]
    EngineUnavailable(String),

    /// The search box could not be found or the query could not be submitted.
    #[error("Failed to submit search query: {0}")]
    Submit(String),

    /// No driver slot became free within the acquire timeout.
    #[error("No browser available after waiting {0} seconds")]
    PoolTimeout(u64),

    /// The driver pool has been shut down.
    #[error("Browser pool is shut down")]
    PoolClosed,

    /// Operation timed out.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Invalid query parameters.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid page URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl ScrapeError {
    /// Returns true when the error means the driver should not be reused.
    pub fn poisons_driver(&self) -> bool {
        matches!(
            self,
            ScrapeError::Browser(_) | ScrapeError::EngineUnavailable(_) | ScrapeError::Submit(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_parse() {
        let err = ScrapeError::Parse("invalid selector".to_string());
        assert_eq!(err.to_string(), "Failed to parse response: invalid selector");
    }

    #[test]
    fn test_error_display_engine_unavailable() {
        let err = ScrapeError::EngineUnavailable("net::ERR_NAME_NOT_RESOLVED".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to access search engine: net::ERR_NAME_NOT_RESOLVED"
        );
    }

    #[test]
    fn test_error_display_pool_timeout() {
        let err = ScrapeError::PoolTimeout(60);
        assert_eq!(err.to_string(), "No browser available after waiting 60 seconds");
    }

    #[test]
    fn test_error_display_invalid_url() {
        let err = ScrapeError::InvalidUrl("ftp://example.com".to_string());
        assert_eq!(err.to_string(), "Invalid URL: ftp://example.com");
    }

    #[test]
    fn test_error_from_url_parse() {
        let err: ScrapeError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ScrapeError::UrlParse(_)));
    }

    #[test]
    fn test_poisons_driver() {
        assert!(ScrapeError::Browser("crashed".into()).poisons_driver());
        assert!(ScrapeError::Submit("no box".into()).poisons_driver());
        assert!(!ScrapeError::Parse("bad".into()).poisons_driver());
        assert!(!ScrapeError::PoolClosed.poisons_driver());
    }
}
