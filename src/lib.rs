//! # a3s-scrape
//!
//! Browser-driven search scraping with a small HTTP API.
//!
//! The crate drives headless Chrome through the search UI of Google and Bing,
//! parses the rendered result pages and serves the results over HTTP:
//!
//! - Web and image search with selector cascades that survive markup drift
//! - A bounded pool of reusable browsers
//! - A TTL cache of search results
//! - Plain-HTTP content extraction for arbitrary pages
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use a3s_scrape::browser::{BrowserFactory, BrowserLaunchConfig};
//! use a3s_scrape::pool::PoolConfig;
//! use a3s_scrape::search::{SearchSettings, Searcher};
//! use a3s_scrape::SearchQuery;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let factory = Arc::new(BrowserFactory::new(BrowserLaunchConfig::default()));
//!     let searcher = Searcher::new(factory, PoolConfig::default(), SearchSettings::default());
//!
//!     let response = searcher.search(SearchQuery::new("rust programming")).await?;
//!     for result in &response.results {
//!         println!("{}: {}", result.title, result.url);
//!     }
//!
//!     searcher.shutdown().await;
//!     Ok(())
//! }
//! ```

mod engine;
mod error;
mod query;
mod result;

pub mod browser;
pub mod browser_setup;
pub mod cache;
pub mod config;
pub mod content;
pub mod driver;
pub mod engines;
pub mod fetcher;
pub mod fetcher_http;
pub mod logging;
pub mod pool;
pub mod search;
pub mod selector;
pub mod server;

pub use engine::{Engine, EngineCategory, EngineConfig, ParseOptions};
pub use error::{Result, ScrapeError};
pub use query::{ImageQuery, SearchEngine, SearchQuery, MAX_IMAGE_RESULTS, MAX_WEB_RESULTS};
pub use result::{
    extract_domain, CombinedSearchResponse, ImageResult, ImageSearchResponse, PageContent,
    PageContentResponse, PageImage, PageLink, SearchResponse, SearchResult, NO_DESCRIPTION,
};
