//! Google web search scraper.
//!
//! Google renders its result page with JavaScript, so the page is driven in
//! a real browser and the resulting DOM is parsed here. Class names such as
//! `VwiC3b` change without notice; every lookup therefore goes through a
//! selector cascade with progressively looser fallbacks.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use super::{absolutize, query_param};
use crate::selector::{element_own_text, element_text, parse_selector, SelectorCascade};
use crate::{
    Engine, EngineCategory, EngineConfig, ParseOptions, Result, SearchEngine, SearchResult,
    NO_DESCRIPTION,
};

pub(crate) const GOOGLE_BASE: &str = "https://www.google.com";

/// Result containers, most specific first.
const RESULT_CONTAINERS: &[&str] = &[
    "#search .g",
    "#rso .g, #rso [data-hveid]",
    r#"#search div[class*="g"], #search div[data-hveid]"#,
];

/// Featured snippets, knowledge panels and answer boxes.
const FEATURED_CONTAINERS: &[&str] =
    &["#search .kp-wholepage, #search .ULSxyf, #search .V3FYCf, #search .IZ6rdc"];

const FEATURED_TITLE: &[&str] = &["h2, h3, [role=\"heading\"]"];

const SNIPPETS: &[&str] = &[".VwiC3b, .IsZvec", "div[data-sncf]"];

const STARS: &str = r#"[role="img"][aria-label*="star"]"#;

const DATES: &str = r#"[class*="date"], [class*="time"], span.MUxGbd"#;

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d{1,2}\s+\w+\s+\d{4}|\d{1,2}/\d{1,2}/\d{2,4}").expect("valid date regex")
    })
}

const BLOCK_FORMS: &str = r#"#captcha-form, form[action*="/sorry/"]"#;

const CAPTCHA_WIDGETS: &str =
    r#"iframe[src*="recaptcha"], script[src*="recaptcha"], .g-recaptcha"#;

const RESULT_MARKERS: &str = "#search, #rso, #islrg, div[data-ri]";

/// Detects Google's bot-check interstitials.
///
/// Result pages that merely mention reCAPTCHA are not blocks: a challenge
/// widget only counts when no result container rendered next to it.
pub(crate) fn google_block_reason(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let present = |css: &str| {
        parse_selector(css)
            .map(|selector| document.select(&selector).next().is_some())
            .unwrap_or(false)
    };
    let blocked =
        present(BLOCK_FORMS) || (present(CAPTCHA_WIDGETS) && !present(RESULT_MARKERS));
    blocked.then(|| "Google returned a CAPTCHA page (bot detected)".to_string())
}

/// Unwraps `/url?q=` redirects and resolves relative links.
pub(crate) fn google_target(href: &str) -> Option<String> {
    if href.starts_with("/url?") {
        let target = query_param(GOOGLE_BASE, href, "q")
            .or_else(|| query_param(GOOGLE_BASE, href, "url"));
        if target.is_some() {
            return target;
        }
    }
    absolutize(GOOGLE_BASE, href)
}

/// Google web search.
pub struct GoogleWeb {
    config: EngineConfig,
}

impl GoogleWeb {
    /// Creates the Google web scraper.
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Google".to_string(),
                shortcut: "google".to_string(),
                engine: SearchEngine::Google,
                category: EngineCategory::General,
                home_url: GOOGLE_BASE.to_string(),
                search_box: r#"textarea[name="q"], input[name="q"]"#.to_string(),
                results_marker: "#search".to_string(),
                consent_button: Some("button#L2AGLb".to_string()),
            },
        }
    }

    /// Creates with custom configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    fn parse_featured(&self, document: &Html, query: &str) -> Result<Vec<SearchResult>> {
        let containers = SelectorCascade::new(FEATURED_CONTAINERS)?;
        let titles = SelectorCascade::new(FEATURED_TITLE)?;
        let links = parse_selector("a[href]")?;

        let (_, elements) = containers.select_first(document);
        let mut featured = Vec::new();

        for (i, element) in elements.into_iter().enumerate() {
            let title = titles
                .first_text(element)
                .unwrap_or_else(|| "Featured Result".to_string());

            let mut snippet = element_text(element);
            if snippet.contains(&title) {
                snippet = snippet.replacen(&title, "", 1).trim().to_string();
            }

            let url = element
                .select(&links)
                .filter_map(|a| a.value().attr("href"))
                .find_map(google_target)
                .unwrap_or_else(|| {
                    format!("{}/search?q={}", GOOGLE_BASE, urlencoding::encode(query))
                });

            featured.push(
                SearchResult::new(title, snippet, url, "google_featured")
                    .with_position(-(i as i32) - 1)
                    .with_feature("type", "featured_snippet"),
            );
        }

        Ok(featured)
    }

    /// Finds the title and target of a result container.
    fn title_and_url(&self, element: ElementRef<'_>) -> Result<(String, Option<String>)> {
        let heading = parse_selector("h3")?;
        let links = parse_selector("a[href]")?;
        let cite = parse_selector("cite")?;
        let not_cite = parse_selector("*:not(cite)")?;

        let mut title = String::new();
        let mut url = None;

        if let Some(h3) = element.select(&heading).next() {
            title = element_text(h3);
            url = element
                .select(&links)
                .find(|a| a.select(&heading).next().is_some())
                .and_then(|a| a.value().attr("href"))
                .and_then(google_target);
        }

        if title.is_empty() || url.is_none() {
            if let Some(link) = element
                .select(&links)
                .find(|a| a.select(&cite).next().is_some())
            {
                url = link.value().attr("href").and_then(google_target);
                if let Some(inner) = link.select(&not_cite).next() {
                    title = element_text(inner);
                }
            }
        }

        Ok((title, url))
    }

    fn snippet(&self, element: ElementRef<'_>, title: &str) -> Result<String> {
        let snippets = SelectorCascade::new(SNIPPETS)?;
        if let Some(text) = snippets.first_text(element) {
            return Ok(text);
        }

        let blocks = parse_selector("div")?;
        let fallback = element
            .select(&blocks)
            .filter(|div| element_own_text(*div).chars().count() > 10)
            .map(element_text)
            .find(|text| !text.is_empty() && text != title);

        Ok(fallback.unwrap_or_else(|| NO_DESCRIPTION.to_string()))
    }

    fn features(&self, element: ElementRef<'_>) -> Result<Vec<(&'static str, String)>> {
        let stars = parse_selector(STARS)?;
        let dates = parse_selector(DATES)?;
        let mut features = Vec::new();

        if let Some(label) = element
            .select(&stars)
            .find_map(|el| el.value().attr("aria-label"))
        {
            features.push(("stars", label.to_string()));
        }

        if let Some(date) = element
            .select(&dates)
            .map(element_text)
            .find(|text| date_pattern().is_match(text))
        {
            features.push(("date", date));
        }

        Ok(features)
    }
}

impl Default for GoogleWeb {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for GoogleWeb {
    type Item = SearchResult;

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn parse(&self, html: &str, options: &ParseOptions) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);

        let mut results = if options.include_featured {
            self.parse_featured(&document, &options.query)?
        } else {
            Vec::new()
        };

        let containers = SelectorCascade::new(RESULT_CONTAINERS)?;
        let (matched, elements) = containers.select_first(&document);
        tracing::debug!(
            "Found {} potential search results (cascade step {:?})",
            elements.len(),
            matched
        );

        let mut seen: HashSet<String> = results.iter().map(|r| r.url.clone()).collect();
        let mut organic = 0;

        // Look at more containers than needed; many are ads, carousels or nested wrappers.
        for (i, element) in elements.into_iter().take(options.limit * 2).enumerate() {
            let (title, url) = self.title_and_url(element)?;
            let url = match url {
                Some(url) if !title.is_empty() && !url.contains("google.com/search") => url,
                _ => continue,
            };
            if !seen.insert(url.clone()) {
                continue;
            }

            let snippet = self.snippet(element, &title)?;
            let mut result =
                SearchResult::new(title, snippet, url, "google").with_position(i as i32 + 1);
            for (key, value) in self.features(element)? {
                result = result.with_feature(key, value);
            }

            tracing::debug!("Added result {}: {}", organic + 1, result.title);
            results.push(result);
            organic += 1;
            if organic >= options.limit {
                break;
            }
        }

        Ok(results)
    }

    fn blocked_reason(&self, html: &str) -> Option<String> {
        google_block_reason(html)
    }
}
