//! Text extraction and normalization
//!
//! This module turns fetched bodies into plain text ([`ContentExtractor`])
//! and strips volatile substrings from that text before hashing and
//! comparison ([`normalize::Normalizer`]).

pub mod normalize;
pub mod sanitize;

pub use normalize::Normalizer;

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::utils::error::ParseError;

/// Converts a fetched body into plain text, one logical block per line
pub trait ContentExtractor: Send + Sync {
    /// Extract text, optionally narrowed to the element matching `selector`
    fn extract(&self, body: &str, selector: Option<&str>) -> Result<String, ParseError>;
}

/// Elements whose text never counts as page content
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "svg", "iframe",
];

/// Fallback content containers, most specific first
const CONTENT_SELECTORS: &[&str] = &["main", "article", "[role=main]", ".content", "#content"];

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("Invalid selector"));

/// HTML extractor backed by `scraper`
pub struct HtmlTextExtractor {
    content_selectors: Vec<Selector>,
}

impl HtmlTextExtractor {
    pub fn new() -> Self {
        let content_selectors = CONTENT_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();
        Self { content_selectors }
    }

    fn locate_root<'a>(
        &self,
        document: &'a Html,
        selector: Option<&str>,
    ) -> Result<Option<ElementRef<'a>>, ParseError> {
        if let Some(raw) = selector {
            let parsed = Selector::parse(raw)
                .map_err(|e| ParseError::InvalidSelector(format!("{raw}: {e}")))?;
            if let Some(found) = document.select(&parsed).next() {
                return Ok(Some(found));
            }
            tracing::debug!(selector = raw, "Selector matched nothing, using default containers");
        }

        let root = self
            .content_selectors
            .iter()
            .find_map(|s| document.select(s).next())
            .or_else(|| document.select(&BODY_SELECTOR).next());
        Ok(root)
    }
}

impl Default for HtmlTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for HtmlTextExtractor {
    fn extract(&self, body: &str, selector: Option<&str>) -> Result<String, ParseError> {
        if body.trim().is_empty() {
            return Err(ParseError::ContentNotFound);
        }

        let document = Html::parse_document(body);
        let root = self
            .locate_root(&document, selector)?
            .ok_or(ParseError::ContentNotFound)?;

        let mut lines = Vec::new();
        for node in root.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let skipped = node
                .ancestors()
                .take_while(|a| a.id() != root.id())
                .filter_map(|a| a.value().as_element())
                .any(|el| SKIPPED_TAGS.contains(&el.name()));
            if skipped {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }

        Ok(sanitize::sanitize_text(&lines.join("\n")))
    }
}

/// Extractor for bodies that are already plain text
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl ContentExtractor for PlainTextExtractor {
    fn extract(&self, body: &str, _selector: Option<&str>) -> Result<String, ParseError> {
        Ok(sanitize::sanitize_text(&sanitize::decode_entities(body)))
    }
}
