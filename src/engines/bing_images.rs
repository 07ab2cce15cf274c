//! Bing Images scraper.
//!
//! Each thumbnail anchor carries an `m` attribute with a JSON blob that
//! describes the full-size image; the rendered `<img>` is only used when
//! that blob is missing or malformed.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Deserialize;

use super::absolutize;
use super::bing::{bing_block_reason, BING_BASE};
use crate::selector::{element_text, parse_selector, SelectorCascade};
use crate::{
    Engine, EngineCategory, EngineConfig, ImageResult, ParseOptions, Result, SearchEngine,
};

const IMAGE_CONTAINERS: &[&str] = &["a.iusc", ".imgpt a", "#mmComponent_images_1 li a"];

/// Metadata embedded in the `m` attribute of a Bing image anchor.
#[derive(Debug, Default, Deserialize)]
struct ImageMeta {
    #[serde(default)]
    murl: Option<String>,
    #[serde(default)]
    turl: Option<String>,
    #[serde(default)]
    purl: Option<String>,
    #[serde(default)]
    t: Option<String>,
}

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*[x×]\s*(\d+)").expect("valid size regex"))
}

/// Parses a `1920 x 1080` style caption.
fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let caps = size_pattern().captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Bing Images search.
pub struct BingImages {
    config: EngineConfig,
}

impl BingImages {
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Bing Images".to_string(),
                shortcut: "bing_images".to_string(),
                engine: SearchEngine::Bing,
                category: EngineCategory::Images,
                home_url: "https://www.bing.com/images".to_string(),
                search_box: r#"#sb_form_q, [name="q"]"#.to_string(),
                results_marker: "#mmComponent_images_1, .imgpt, a.iusc".to_string(),
                consent_button: Some("#bnp_btn_accept".to_string()),
            },
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for BingImages {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for BingImages {
    type Item = ImageResult;

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn parse(&self, html: &str, options: &ParseOptions) -> Result<Vec<ImageResult>> {
        let document = Html::parse_document(html);
        let containers = SelectorCascade::new(IMAGE_CONTAINERS)?;
        let img_selector = parse_selector("img")?;
        let info_selector = parse_selector(".img_info span")?;

        let (_, elements) = containers.select_first(&document);
        tracing::debug!("Found {} potential Bing image results", elements.len());

        let mut images = Vec::new();
        let mut seen = HashSet::new();

        for element in elements {
            let meta = match element.value().attr("m") {
                Some(raw) => serde_json::from_str::<ImageMeta>(raw).unwrap_or_else(|e| {
                    tracing::debug!("Ignoring malformed image metadata: {}", e);
                    ImageMeta::default()
                }),
                None => ImageMeta::default(),
            };
            let img = element.select(&img_selector).next();
            let img_attr = |name: &str| {
                img.and_then(|img| img.value().attr(name))
                    .map(str::to_string)
            };

            let thumbnail_url = non_empty(meta.turl)
                .or_else(|| non_empty(img_attr("src")))
                .or_else(|| non_empty(img_attr("data-src")))
                .unwrap_or_default();
            let image_url = non_empty(meta.murl).unwrap_or_else(|| thumbnail_url.clone());
            if image_url.is_empty() {
                continue;
            }
            let image_url = absolutize(BING_BASE, &image_url).unwrap_or(image_url);
            if !seen.insert(image_url.clone()) {
                continue;
            }

            let source_url = non_empty(meta.purl).unwrap_or_default();
            let title = non_empty(meta.t)
                .or_else(|| non_empty(img_attr("alt")))
                .unwrap_or_default();

            let (width, height) = element
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|parent| {
                    parent
                        .select(&info_selector)
                        .find_map(|span| parse_dimensions(&element_text(span)))
                })
                .map_or((None, None), |(w, h)| (Some(w), Some(h)));

            images.push(
                ImageResult::new(title, image_url, thumbnail_url, source_url, "bing")
                    .with_position(images.len() as i32 + 1)
                    .with_dimensions(width, height),
            );

            if images.len() >= options.limit {
                break;
            }
        }

        Ok(images)
    }

    fn blocked_reason(&self, html: &str) -> Option<String> {
        bing_block_reason(html)
    }
}
