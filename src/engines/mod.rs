//! Search engine scrapers.

mod bing;
mod bing_images;
mod google;
mod google_images;

pub use bing::BingWeb;
pub use bing_images::BingImages;
pub use google::GoogleWeb;
pub use google_images::GoogleImages;

use url::Url;

/// Resolves `href` against `base`, returning `None` for empty, fragment-only
/// and script links.
pub(crate) fn absolutize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .ok()
}

/// Returns the value of a query parameter of a (possibly relative) URL.
pub(crate) fn query_param(base: &str, href: &str, name: &str) -> Option<String> {
    let url = Url::parse(base).ok()?.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
