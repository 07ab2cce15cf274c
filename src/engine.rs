//! Search engine trait and configuration.

use serde::{Deserialize, Serialize};

use crate::{Result, SearchEngine};

/// Categories for search engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineCategory {
    #[default]
    General,
    Images,
}

/// Describes the UI a browser walks through to run a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Display name of the engine.
    pub name: String,
    /// Short identifier, also used as the `source` of results.
    pub shortcut: String,
    /// Which search provider this engine drives.
    pub engine: SearchEngine,
    /// Kind of results produced.
    pub category: EngineCategory,
    /// Page loaded before typing the query.
    pub home_url: String,
    /// CSS selector of the query input.
    pub search_box: String,
    /// CSS selector whose presence means results have rendered.
    pub results_marker: String,
    /// Cookie-consent button clicked, when shown, before searching.
    #[serde(default)]
    pub consent_button: Option<String>,
}

/// Per-request parsing options.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// The submitted query terms.
    pub query: String,
    /// Maximum number of regular results to return.
    pub limit: usize,
    /// Whether featured snippets and knowledge panels are extracted.
    pub include_featured: bool,
}

impl ParseOptions {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            include_featured: true,
        }
    }

    pub fn with_featured(mut self, include_featured: bool) -> Self {
        self.include_featured = include_featured;
        self
    }
}

/// A search engine scraper: UI description plus a parser for its result page.
pub trait Engine: Send + Sync {
    /// Record type extracted from the result page.
    type Item: Clone + Send + Sync + 'static;

    /// Returns the engine configuration.
    fn config(&self) -> &EngineConfig;

    /// Extracts results from the rendered result page.
    fn parse(&self, html: &str, options: &ParseOptions) -> Result<Vec<Self::Item>>;

    /// Describes why the page is a bot-check instead of results, if it is one.
    fn blocked_reason(&self, _html: &str) -> Option<String> {
        None
    }

    /// Returns the engine name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Returns the engine shortcut.
    fn shortcut(&self) -> &str {
        &self.config().shortcut
    }
}
