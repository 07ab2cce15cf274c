//! Plain-HTTP page content scraping.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scraper::{ElementRef, Html, Node};
use tracing::{debug, info, warn};

use crate::engines::absolutize;
use crate::fetcher::PageFetcher;
use crate::fetcher_http::HttpFetcher;
use crate::result::extract_domain;
use crate::selector::{element_text, parse_selector};
use crate::{PageContent, PageContentResponse, PageImage, PageLink, Result, ScrapeError};

const MAX_LINKS: usize = 100;
const MAX_IMAGES: usize = 50;
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript"];

/// Settings of the content scraper.
#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// Request timeout for a single page.
    pub timeout: Duration,
    /// Where scraped pages are persisted; nothing is written when `None`.
    pub save_dir: Option<PathBuf>,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            save_dir: Some(PathBuf::from("data")),
        }
    }
}

/// Fetches pages over HTTP and extracts their text, links, images and metadata.
pub struct ContentScraper {
    fetcher: Arc<dyn PageFetcher>,
    save_dir: Option<PathBuf>,
}

impl ContentScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            save_dir: None,
        }
    }

    /// Builds a scraper backed by [`HttpFetcher`].
    pub fn from_settings(settings: &ContentSettings) -> Result<Self> {
        let fetcher = HttpFetcher::new(settings.timeout)?;
        Ok(Self {
            fetcher: Arc::new(fetcher),
            save_dir: settings.save_dir.clone(),
        })
    }

    /// Persists every successful scrape as JSON under `dir`.
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    /// Scrapes a page.
    ///
    /// Only a malformed URL is returned as an error; fetch failures are
    /// reported in the response's `error` field.
    pub async fn scrape(&self, url: &str) -> Result<PageContentResponse> {
        let url = url.trim();
        validate_url(url)?;
        let start = Instant::now();
        info!("Scraping content from {}", url);

        let outcome = match self.fetcher.fetch(url).await {
            Ok(html) => parse_page(url, &html),
            Err(e) => Err(e),
        };

        let response = match outcome {
            Ok(content) => {
                self.save(&content);
                PageContentResponse {
                    url: url.to_string(),
                    content: Some(content),
                    error: None,
                    execution_time: start.elapsed().as_secs_f64(),
                }
            }
            Err(e) => {
                warn!("Failed to scrape {}: {}", url, e);
                PageContentResponse {
                    url: url.to_string(),
                    content: None,
                    error: Some(format!("Failed to scrape page: {}", e)),
                    execution_time: start.elapsed().as_secs_f64(),
                }
            }
        };
        Ok(response)
    }

    fn save(&self, content: &PageContent) {
        let Some(ref dir) = self.save_dir else {
            return;
        };
        let domain = extract_domain(&content.url).replace(':', "_");
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.json", domain, timestamp));
        let dir = dir.clone();

        let json = match serde_json::to_string_pretty(content) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode page content: {}", e);
                return;
            }
        };
        tokio::spawn(async move {
            let written = async {
                tokio::fs::create_dir_all(&dir).await?;
                tokio::fs::write(&path, json).await
            };
            match written.await {
                Ok(()) => debug!("Saved page content to {}", path.display()),
                Err(e) => warn!("Failed to save page content {}: {}", path.display(), e),
            }
        });
    }
}

/// Rejects anything that is not an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<()> {
    let url = url.trim();
    if url.len() < 5 || !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ScrapeError::InvalidUrl(format!(
            "'{}' must start with http:// or https://",
            url
        )));
    }
    Ok(())
}

/// Extracts structured content from fetched markup.
pub fn parse_page(url: &str, html: &str) -> Result<PageContent> {
    let document = Html::parse_document(html);
    let title_selector = parse_selector("title")?;
    let meta_selector = parse_selector("meta")?;
    let link_selector = parse_selector("a[href]")?;
    let img_selector = parse_selector("img[src]")?;
    let block_selector = parse_selector("p, h1, h2, h3, h4, h5, h6, li")?;

    let title = document
        .select(&title_selector)
        .map(element_text)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| "No title found".to_string());

    let mut meta_tags = BTreeMap::new();
    for meta in document.select(&meta_selector) {
        let attrs = meta.value();
        if let Some(name) = attrs.attr("name").or_else(|| attrs.attr("property")) {
            meta_tags.insert(
                name.to_string(),
                attrs.attr("content").unwrap_or_default().to_string(),
            );
        }
    }

    let links = document
        .select(&link_selector)
        .filter_map(|a| {
            let href = absolutize(url, a.value().attr("href")?)?;
            Some(PageLink {
                href,
                text: element_text(a),
                title: a.value().attr("title").unwrap_or_default().to_string(),
            })
        })
        .take(MAX_LINKS)
        .collect();

    let images = document
        .select(&img_selector)
        .filter_map(|img| {
            let src = absolutize(url, img.value().attr("src")?)?;
            Some(PageImage {
                src,
                alt: img.value().attr("alt").unwrap_or_default().to_string(),
                title: img.value().attr("title").unwrap_or_default().to_string(),
            })
        })
        .take(MAX_IMAGES)
        .collect();

    let text_blocks = document
        .select(&block_selector)
        .map(visible_text)
        .filter(|text| text.chars().count() > 10)
        .collect();

    let mut lines = Vec::new();
    collect_text(document.root_element(), &mut lines);
    let content = collapse_blank_lines(&lines.join("\n"));

    debug!("Parsed {} ({} chars of text)", url, content.len());
    Ok(PageContent {
        url: url.to_string(),
        title,
        content,
        html: html.to_string(),
        meta_tags,
        links,
        images,
        text_blocks,
    })
}

/// Collects trimmed, non-empty text nodes outside script-like subtrees.
fn collect_text<'a>(element: ElementRef<'a>, lines: &mut Vec<&'a str>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, lines);
                }
            }
            _ => {}
        }
    }
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    collect_text(element, &mut lines);
    lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = false;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank_run = false;
    }
    out
}
