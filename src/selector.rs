//! Selector cascades: ordered CSS selector fallbacks for drifting markup.

use scraper::{ElementRef, Html, Node, Selector};

use crate::{Result, ScrapeError};

/// Parses a single CSS selector, mapping failures to [`ScrapeError::Parse`].
pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::Parse(format!("Failed to parse selector '{}': {:?}", css, e)))
}

/// An ordered list of selectors tried in sequence until one matches.
///
/// Search engines rename their CSS classes regularly. Each cascade lists the
/// current markup first and older or more generic shapes after it, so
/// extraction keeps working while at least one of them still matches.
#[derive(Debug, Clone)]
pub struct SelectorCascade {
    selectors: Vec<Selector>,
}

impl SelectorCascade {
    /// Compiles every selector of the cascade.
    pub fn new(sources: &[&'static str]) -> Result<Self> {
        let selectors = sources
            .iter()
            .map(|css| parse_selector(css))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { selectors })
    }

    /// Returns the matches of the first selector that yields any element in
    /// the document, with the index of that selector.
    pub fn select_first<'a>(&self, document: &'a Html) -> (Option<usize>, Vec<ElementRef<'a>>) {
        for (i, selector) in self.selectors.iter().enumerate() {
            let found: Vec<_> = document.select(selector).collect();
            if !found.is_empty() {
                return (Some(i), found);
            }
        }
        (None, Vec::new())
    }

    /// Like [`select_first`](Self::select_first) but scoped to one element.
    pub fn select_within<'a>(&self, element: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.selectors
            .iter()
            .map(|selector| element.select(selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    /// Returns the first non-empty trimmed text produced by any selector.
    pub fn first_text(&self, element: ElementRef<'_>) -> Option<String> {
        self.selectors.iter().find_map(|selector| {
            element
                .select(selector)
                .map(element_text)
                .find(|text| !text.is_empty())
        })
    }

    /// Returns true when any selector matches inside the document.
    pub fn matches_any(&self, document: &Html) -> bool {
        self.selectors
            .iter()
            .any(|selector| document.select(selector).next().is_some())
    }
}

/// Concatenated text of an element with surrounding whitespace trimmed and
/// inner runs collapsed to single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of an element's direct text children only, trimmed.
pub fn element_own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(text.trim()),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><body>
            <div id="rso">
                <div class="g legacy">First <b>bold</b></div>
                <div data-hveid="x">Second</div>
            </div>
            <p class="note">   spaced
                text   </p>
        </body></html>
    "#;

    #[test]
    fn test_invalid_selector_is_parse_error() {
        let err = SelectorCascade::new(&["div", "::::"]).unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[test]
    fn test_select_first_uses_first_matching_selector() {
        let document = Html::parse_document(HTML);
        let cascade = SelectorCascade::new(&["#search .g", "#rso [data-hveid]", "#rso .g"]).unwrap();
        let (index, found) = cascade.select_first(&document);
        assert_eq!(index, Some(1));
        assert_eq!(found.len(), 1);
        assert_eq!(element_text(found[0]), "Second");
    }

    #[test]
    fn test_select_first_no_match() {
        let document = Html::parse_document(HTML);
        let cascade = SelectorCascade::new(&["#missing", "table"]).unwrap();
        let (index, found) = cascade.select_first(&document);
        assert!(index.is_none());
        assert!(found.is_empty());
        assert!(!cascade.matches_any(&document));
    }

    #[test]
    fn test_select_within_is_scoped_to_element() {
        let document = Html::parse_document(
            r#"<p class="b">outside</p>
               <div id="r"><span class="b">one</span><span class="b">two</span><i class="c">x</i></div>"#,
        );
        let root = document
            .select(&parse_selector("#r").unwrap())
            .next()
            .unwrap();

        let cascade = SelectorCascade::new(&[".a", ".b", ".c"]).unwrap();
        let found = cascade.select_within(root);
        assert_eq!(found.len(), 2);
        assert_eq!(element_text(found[0]), "one");

        let none = SelectorCascade::new(&["p", "table"]).unwrap();
        assert!(none.select_within(root).is_empty());
    }

    #[test]
    fn test_first_text_skips_empty_matches() {
        let document = Html::parse_document(
            r#"<div id="r"><span class="a"> </span><span class="b">Snippet</span></div>"#,
        );
        let root = document
            .select(&parse_selector("#r").unwrap())
            .next()
            .unwrap();
        let cascade = SelectorCascade::new(&[".a", ".b"]).unwrap();
        assert_eq!(cascade.first_text(root).as_deref(), Some("Snippet"));
    }

    #[test]
    fn test_element_text_collapses_whitespace() {
        let document = Html::parse_document(HTML);
        let note = document
            .select(&parse_selector("p.note").unwrap())
            .next()
            .unwrap();
        assert_eq!(element_text(note), "spaced text");
    }

    #[test]
    fn test_element_own_text_ignores_children() {
        let document = Html::parse_document(HTML);
        let first = document
            .select(&parse_selector(".g").unwrap())
            .next()
            .unwrap();
        assert_eq!(element_own_text(first), "First");
        assert_eq!(element_text(first), "First bold");
    }
}
