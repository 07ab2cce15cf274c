//! Bing web search scraper.

use std::collections::HashSet;

use scraper::Html;

use super::absolutize;
use crate::selector::{element_text, SelectorCascade};
use crate::{
    Engine, EngineCategory, EngineConfig, ParseOptions, Result, SearchEngine, SearchResult,
    NO_DESCRIPTION,
};

pub(crate) const BING_BASE: &str = "https://www.bing.com";

const RESULT_CONTAINERS: &[&str] = &["#b_results > li.b_algo", "li.b_algo"];

const SNIPPETS: &[&str] = &[".b_caption p", ".b_lineclamp2, .b_algoSlug"];

const TITLE_LINKS: &[&str] = &["h2 a", ".b_title a"];

const ATTRIBUTIONS: &[&str] = &[".b_attribution cite", "cite"];

/// Detects Bing's challenge pages.
pub(crate) fn bing_block_reason(html: &str) -> Option<String> {
    if html.contains("b_captcha") || html.contains("/turing/captcha") {
        Some("Bing returned a CAPTCHA challenge (bot detected)".to_string())
    } else {
        None
    }
}

/// Bing web search.
pub struct BingWeb {
    config: EngineConfig,
}

impl BingWeb {
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Bing".to_string(),
                shortcut: "bing".to_string(),
                engine: SearchEngine::Bing,
                category: EngineCategory::General,
                home_url: BING_BASE.to_string(),
                search_box: r#"#sb_form_q, [name="q"]"#.to_string(),
                results_marker: "#b_results".to_string(),
                consent_button: Some("#bnp_btn_accept".to_string()),
            },
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for BingWeb {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for BingWeb {
    type Item = SearchResult;

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn parse(&self, html: &str, options: &ParseOptions) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);
        let containers = SelectorCascade::new(RESULT_CONTAINERS)?;
        let snippets = SelectorCascade::new(SNIPPETS)?;
        let title_links = SelectorCascade::new(TITLE_LINKS)?;
        let attributions = SelectorCascade::new(ATTRIBUTIONS)?;

        let (_, elements) = containers.select_first(&document);
        tracing::debug!("Found {} potential Bing results", elements.len());

        let mut results = Vec::new();
        let mut seen = HashSet::new();

        for (i, element) in elements.into_iter().enumerate() {
            let Some(&link) = title_links.select_within(element).first() else {
                continue;
            };
            let title = element_text(link);
            let url = match link.value().attr("href").and_then(|h| absolutize(BING_BASE, h)) {
                Some(url) => url,
                None => continue,
            };
            if title.is_empty() || url.contains("bing.com/search") || !seen.insert(url.clone()) {
                continue;
            }

            let snippet = snippets
                .first_text(element)
                .unwrap_or_else(|| NO_DESCRIPTION.to_string());

            let mut result =
                SearchResult::new(title, snippet, url, "bing").with_position(i as i32 + 1);
            if let Some(&cite) = attributions.select_within(element).first() {
                let text = element_text(cite);
                if !text.is_empty() {
                    result = result.with_feature("attribution", text);
                }
            }

            results.push(result);
            if results.len() >= options.limit {
                break;
            }
        }

        Ok(results)
    }

    fn blocked_reason(&self, html: &str) -> Option<String> {
        bing_block_reason(html)
    }
}
