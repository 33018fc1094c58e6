// src/ingest/sources.rs
//! Source registry: one row of rules per listing page. Adding a source is a
//! new row here; nothing else in the pipeline changes.

use scraper::ElementRef;
use url::Url;

use super::extract::ExtractError;

/// Element → raw text.
pub type TextRule = fn(ElementRef<'_>) -> Result<String, ExtractError>;
/// (element, page URL) → absolute link.
pub type LinkRule = fn(ElementRef<'_>, &Url) -> Result<String, ExtractError>;

#[derive(Clone, Copy)]
pub struct SourceDefinition {
    pub id: &'static str,
    pub fetch_url: &'static str,
    /// CSS selector list choosing the headline elements, in document order.
    pub item_selector: &'static str,
    pub text_extractor: TextRule,
    pub link_resolver: LinkRule,
}

impl std::fmt::Debug for SourceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDefinition")
            .field("id", &self.id)
            .field("fetch_url", &self.fetch_url)
            .field("item_selector", &self.item_selector)
            .finish_non_exhaustive()
    }
}

pub static SOURCES: &[SourceDefinition] = &[
    SourceDefinition {
        id: "thehindu",
        fetch_url: "https://www.thehindu.com/news/national/",
        item_selector: "h3.title a, .story-card-news h3 a",
        text_extractor: element_text,
        link_resolver: href_joined,
    },
    SourceDefinition {
        id: "pib",
        fetch_url: "https://pib.gov.in/PressReleasePage.aspx",
        item_selector: ".ContentDiv a",
        text_extractor: element_text,
        link_resolver: href_joined,
    },
    SourceDefinition {
        id: "indianexpress",
        fetch_url: "https://indianexpress.com/section/india/",
        item_selector: ".articles .title a",
        text_extractor: element_text,
        link_resolver: href_joined,
    },
];

/// Case-insensitive lookup in the built-in table.
pub fn lookup(id: &str) -> Option<&'static SourceDefinition> {
    find_in(SOURCES, id)
}

pub fn find_in<'a>(registry: &'a [SourceDefinition], id: &str) -> Option<&'a SourceDefinition> {
    let id = id.trim();
    registry.iter().find(|s| s.id.eq_ignore_ascii_case(id))
}

pub fn known_ids() -> impl Iterator<Item = &'static str> {
    SOURCES.iter().map(|s| s.id)
}

/// All descendant text nodes, concatenated.
pub fn element_text(el: ElementRef<'_>) -> Result<String, ExtractError> {
    let text: String = el.text().collect();
    if text.trim().is_empty() {
        return Err(ExtractError::EmptyText);
    }
    Ok(text)
}

/// `href` resolved against the page URL.
pub fn href_joined(el: ElementRef<'_>, base: &Url) -> Result<String, ExtractError> {
    let href = el
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(ExtractError::MissingHref)?;
    base.join(href)
        .map(|u| u.to_string())
        .map_err(|e| ExtractError::BadLink(format!("{href}: {e}")))
}
