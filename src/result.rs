//! Result and response types returned by the scrapers and the HTTP API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Placeholder snippet used when a result carries no description.
pub const NO_DESCRIPTION: &str = "No description available";

/// A single web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Random identifier assigned at extraction time.
    pub id: String,
    /// Result title.
    pub title: String,
    /// Result description/snippet.
    pub snippet: String,
    /// Result URL.
    pub url: String,
    /// Origin of the result (`google`, `google_featured`, `bing`).
    pub source: String,
    /// Host part of `url`.
    #[serde(default)]
    pub domain: String,
    /// 1-based rank for organic results, negative for featured entries.
    #[serde(default)]
    pub position: i32,
    /// Extra properties found on the result (stars, date, attribution, ...).
    #[serde(default)]
    pub features: BTreeMap<String, serde_json::Value>,
}

impl SearchResult {
    /// Creates a new result; the domain is derived from the URL.
    pub fn new(
        title: impl Into<String>,
        snippet: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            snippet: snippet.into(),
            domain: extract_domain(&url),
            url,
            source: source.into(),
            position: 0,
            features: BTreeMap::new(),
        }
    }

    /// Sets the position.
    pub fn with_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Adds a feature.
    pub fn with_feature(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.features.insert(key.into(), value.into());
        self
    }

    /// Returns true for featured snippets and knowledge panels.
    pub fn is_featured(&self) -> bool {
        self.position < 0
    }
}

/// A single image search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub id: String,
    pub title: String,
    /// Full-size image URL, when the engine exposes it.
    pub image_url: String,
    /// Thumbnail URL as rendered on the results page.
    pub thumbnail_url: String,
    /// Page hosting the image.
    pub source_url: String,
    /// Host part of `source_url` (or `image_url` when there is no page).
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub position: i32,
    pub source: String,
}

impl ImageResult {
    /// Creates a new image result.
    pub fn new(
        title: impl Into<String>,
        image_url: impl Into<String>,
        thumbnail_url: impl Into<String>,
        source_url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let image_url = image_url.into();
        let source_url = source_url.into();
        let domain = if source_url.is_empty() {
            extract_domain(&image_url)
        } else {
            extract_domain(&source_url)
        };
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            image_url,
            thumbnail_url: thumbnail_url.into(),
            source_url,
            domain,
            width: None,
            height: None,
            position: 0,
            source: source.into(),
        }
    }

    /// Sets the position.
    pub fn with_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Sets the image dimensions.
    pub fn with_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Response of `/api/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub total_results: usize,
    /// Seconds spent serving the request.
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of `/api/image-search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSearchResponse {
    pub query: String,
    pub images: Vec<ImageResult>,
    #[serde(default)]
    pub total_results: usize,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of `/api/search-with-images`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedSearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub images: Vec<ImageResult>,
    #[serde(default)]
    pub total_results: usize,
    #[serde(default)]
    pub total_images: usize,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub error: Option<String>,
}

/// A hyperlink found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub href: String,
    pub text: String,
    pub title: String,
}

/// An image found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub src: String,
    pub alt: String,
    pub title: String,
}

/// Structured content of a fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    /// Visible text, one text node per line.
    pub content: String,
    pub html: String,
    #[serde(default)]
    pub meta_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub links: Vec<PageLink>,
    #[serde(default)]
    pub images: Vec<PageImage>,
    #[serde(default)]
    pub text_blocks: Vec<String>,
}

/// Response of `/api/content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContentResponse {
    pub url: String,
    #[serde(default)]
    pub content: Option<PageContent>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time: f64,
}

/// Returns the network location (host and explicit port) of a URL, or an
/// empty string when it cannot be parsed.
pub fn extract_domain(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        },
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_new() {
        let result = SearchResult::new(
            "Rust",
            "A language empowering everyone",
            "https://www.rust-lang.org/learn",
            "google",
        );
        assert_eq!(result.title, "Rust");
        assert_eq!(result.domain, "www.rust-lang.org");
        assert_eq!(result.source, "google");
        assert_eq!(result.position, 0);
        assert!(result.features.is_empty());
        assert!(Uuid::parse_str(&result.id).is_ok());
    }

    #[test]
    fn test_search_result_ids_are_unique() {
        let a = SearchResult::new("t", "s", "https://a.com", "google");
        let b = SearchResult::new("t", "s", "https://a.com", "google");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_search_result_with_feature() {
        let result = SearchResult::new("t", "s", "https://a.com", "google")
            .with_position(-1)
            .with_feature("type", "featured_snippet");
        assert!(result.is_featured());
        assert_eq!(result.features["type"], "featured_snippet");
    }

    #[test]
    fn test_image_result_domain_prefers_source_page() {
        let image = ImageResult::new(
            "Ferris",
            "https://cdn.example.net/ferris.png",
            "https://tbn.example.com/thumb",
            "https://rustacean.net/",
            "bing",
        );
        assert_eq!(image.domain, "rustacean.net");

        let orphan = ImageResult::new("x", "https://cdn.example.net/a.png", "", "", "bing");
        assert_eq!(orphan.domain, "cdn.example.net");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://example.com/path?q=1"), "example.com");
        assert_eq!(extract_domain("http://localhost:8080/x"), "localhost:8080");
        assert_eq!(extract_domain("not a url"), "");
        assert_eq!(extract_domain(""), "");
    }

    #[test]
    fn test_search_response_serialization() {
        let response = SearchResponse {
            query: "rust".to_string(),
            results: vec![],
            total_results: 0,
            execution_time: 0.5,
            error: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"query\":\"rust\""));
        assert!(json.contains("\"error\":null"));
    }

    #[test]
    fn test_page_content_response_deserialization_defaults() {
        let json = r#"{"url":"https://example.com"}"#;
        let response: PageContentResponse = serde_json::from_str(json).unwrap();
        assert!(response.content.is_none());
        assert!(response.error.is_none());
        assert_eq!(response.execution_time, 0.0);
    }
}
