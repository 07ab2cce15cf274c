//! Search query representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, ScrapeError};

/// Largest number of web results a single request may ask for.
pub const MAX_WEB_RESULTS: usize = 20;
/// Largest number of image results a single request may ask for.
pub const MAX_IMAGE_RESULTS: usize = 50;

/// Search engine driven by the browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    #[default]
    Google,
    Bing,
}

impl SearchEngine {
    /// Lowercase identifier used in cache keys, file names and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchEngine::Google => "google",
            SearchEngine::Bing => "bing",
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchEngine {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "g" => Ok(SearchEngine::Google),
            "bing" | "b" => Ok(SearchEngine::Bing),
            other => Err(ScrapeError::InvalidQuery(format!(
                "Unknown search engine '{}', expected 'google' or 'bing'",
                other
            ))),
        }
    }
}

/// A web search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The search terms.
    pub query: String,
    /// Number of organic results wanted (1..=20).
    pub num_results: usize,
    /// Engine to drive.
    pub engine: SearchEngine,
    /// Whether cached results may be served.
    pub use_cache: bool,
    /// Whether featured snippets and knowledge panels are extracted.
    pub include_featured: bool,
}

impl SearchQuery {
    /// Creates a new query with default options.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_results: 10,
            engine: SearchEngine::Google,
            use_cache: true,
            include_featured: true,
        }
    }

    /// Sets the number of results.
    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    /// Sets the engine.
    pub fn with_engine(mut self, engine: SearchEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Enables or disables the result cache.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Enables or disables featured snippet extraction.
    pub fn with_featured(mut self, include_featured: bool) -> Self {
        self.include_featured = include_featured;
        self
    }

    /// Key under which results are cached.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.engine, self.query)
    }

    /// Checks the query terms and the result count.
    pub fn validate(&self) -> Result<()> {
        validate_terms(&self.query)?;
        validate_count(self.num_results, MAX_WEB_RESULTS, "num_results")
    }
}

/// An image search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageQuery {
    pub query: String,
    /// Number of images wanted (1..=50).
    pub num_results: usize,
    pub engine: SearchEngine,
    pub use_cache: bool,
}

impl ImageQuery {
    /// Creates a new image query with default options.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_results: 20,
            engine: SearchEngine::Google,
            use_cache: true,
        }
    }

    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    pub fn with_engine(mut self, engine: SearchEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Key under which results are cached.
    pub fn cache_key(&self) -> String {
        format!("images:{}:{}", self.engine, self.query)
    }

    /// Checks the query terms and the result count.
    pub fn validate(&self) -> Result<()> {
        validate_terms(&self.query)?;
        validate_count(self.num_results, MAX_IMAGE_RESULTS, "num_results")
    }
}

fn validate_terms(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(ScrapeError::InvalidQuery("Query cannot be empty".into()));
    }
    Ok(())
}

fn validate_count(count: usize, max: usize, field: &str) -> Result<()> {
    if count == 0 || count > max {
        return Err(ScrapeError::InvalidQuery(format!(
            "{} must be between 1 and {}, got {}",
            field, max, count
        )));
    }
    Ok(())
}
