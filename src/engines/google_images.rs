//! Google Images scraper.

use std::collections::HashSet;

use scraper::{ElementRef, Html};

use super::google::{google_block_reason, GOOGLE_BASE};
use super::{absolutize, query_param};
use crate::selector::{parse_selector, SelectorCascade};
use crate::{
    Engine, EngineCategory, EngineConfig, ImageResult, ParseOptions, Result, SearchEngine,
};

const IMAGE_CONTAINERS: &[&str] = &[
    "div[data-ri]",
    "#islrg div.isv-r",
    "div[data-lpage]",
    r#"div[jsname="dTDiAc"]"#,
];

const TITLES: &[&str] = &["h3, .toI8Rb, .bytUYc"];

/// Google Images search.
pub struct GoogleImages {
    config: EngineConfig,
}

impl GoogleImages {
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Google Images".to_string(),
                shortcut: "google_images".to_string(),
                engine: SearchEngine::Google,
                category: EngineCategory::Images,
                home_url: "https://images.google.com".to_string(),
                search_box: r#"textarea[name="q"], input[name="q"]"#.to_string(),
                results_marker: "#islrg, #search, div[data-ri]".to_string(),
                consent_button: Some("button#L2AGLb".to_string()),
            },
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for GoogleImages {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the rendered thumbnail, preferring real URLs over inline `data:` images.
fn thumbnail(img: ElementRef<'_>) -> String {
    let candidates: Vec<&str> = ["src", "data-src", "data-iurl"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    candidates
        .iter()
        .find(|value| !value.starts_with("data:"))
        .or_else(|| candidates.first())
        .and_then(|value| {
            if value.starts_with("data:") {
                Some(value.to_string())
            } else {
                absolutize(GOOGLE_BASE, value)
            }
        })
        .unwrap_or_default()
}

fn dimension(element: ElementRef<'_>, attr: &str) -> Option<u32> {
    element.value().attr(attr).and_then(|v| v.trim().parse().ok())
}

impl Engine for GoogleImages {
    type Item = ImageResult;

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn parse(&self, html: &str, options: &ParseOptions) -> Result<Vec<ImageResult>> {
        let document = Html::parse_document(html);
        let containers = SelectorCascade::new(IMAGE_CONTAINERS)?;
        let titles = SelectorCascade::new(TITLES)?;
        let img_selector = parse_selector("img")?;
        let imgres = parse_selector(r#"a[href*="imgres"]"#)?;
        let links = parse_selector("a[href]")?;
        let data_title = parse_selector("[data-title]")?;

        let (matched, elements) = containers.select_first(&document);
        tracing::debug!(
            "Found {} potential image results (cascade step {:?})",
            elements.len(),
            matched
        );

        let mut images = Vec::new();
        let mut seen = HashSet::new();

        for element in elements {
            let img = element.select(&img_selector).next();
            let thumbnail_url = img.map(thumbnail).unwrap_or_default();

            let imgres_href = element
                .select(&imgres)
                .find_map(|a| a.value().attr("href"));
            let image_url = imgres_href
                .and_then(|href| query_param(GOOGLE_BASE, href, "imgurl"))
                .unwrap_or_else(|| thumbnail_url.clone());
            if image_url.is_empty() {
                continue;
            }

            let source_url = imgres_href
                .and_then(|href| query_param(GOOGLE_BASE, href, "imgrefurl"))
                .or_else(|| element.value().attr("data-lpage").map(str::to_string))
                .or_else(|| {
                    element
                        .select(&links)
                        .filter_map(|a| a.value().attr("href"))
                        .find(|href| href.starts_with("http") && !href.contains("google."))
                        .map(str::to_string)
                })
                .unwrap_or_default();

            let title = titles
                .first_text(element)
                .or_else(|| {
                    std::iter::once(element)
                        .chain(element.select(&data_title))
                        .find_map(|el| el.value().attr("data-title"))
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                })
                .or_else(|| {
                    img.and_then(|img| img.value().attr("alt"))
                        .map(|alt| alt.trim().to_string())
                })
                .unwrap_or_default();

            if !seen.insert(image_url.clone()) {
                continue;
            }

            let image = ImageResult::new(title, image_url, thumbnail_url, source_url, "google")
                .with_position(images.len() as i32 + 1)
                .with_dimensions(dimension(element, "data-ow"), dimension(element, "data-oh"));
            images.push(image);

            if images.len() >= options.limit {
                break;
            }
        }

        Ok(images)
    }

    fn blocked_reason(&self, html: &str) -> Option<String> {
        google_block_reason(html)
    }
}
