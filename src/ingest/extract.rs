// src/ingest/extract.rs
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::collapse_whitespace;
use super::sources::SourceDefinition;
use super::types::Candidate;

/// Only the first N matching elements of a page are looked at.
pub const MAX_ELEMENTS_PER_SOURCE: usize = 20;
/// Shorter texts are navigation chrome, icons, "More" links.
pub const MIN_TEXT_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid item selector {0:?}")]
    Selector(String),
    #[error("invalid source url {0:?}")]
    SourceUrl(String),
    #[error("element has no text")]
    EmptyText,
    #[error("text shorter than the minimum length")]
    TooShort,
    #[error("element has no href")]
    MissingHref,
    #[error("unresolvable link {0}")]
    BadLink(String),
}

/// Parse `markup` and apply `source`'s rules. Only a bad selector or URL in
/// the source definition fails the whole page; per-element failures drop
/// that element and the rest carry on.
pub fn extract(markup: &str, source: &SourceDefinition) -> Result<Vec<Candidate>, ExtractError> {
    let selector = Selector::parse(source.item_selector)
        .map_err(|e| ExtractError::Selector(format!("{}: {e}", source.item_selector)))?;
    let base =
        Url::parse(source.fetch_url).map_err(|_| ExtractError::SourceUrl(source.fetch_url.into()))?;

    // html5ever recovers from unclosed/misnested tags instead of failing.
    let document = Html::parse_document(markup);

    let candidates = document
        .select(&selector)
        .take(MAX_ELEMENTS_PER_SOURCE)
        .map(|el| extract_one(el, source, &base))
        .fold(Vec::new(), |mut acc, res| {
            match res {
                Ok(c) => acc.push(c),
                Err(e) => tracing::debug!(target: "ingest", source = source.id, error = %e, "element skipped"),
            }
            acc
        });

    Ok(candidates)
}

fn extract_one(
    el: ElementRef<'_>,
    source: &SourceDefinition,
    base: &Url,
) -> Result<Candidate, ExtractError> {
    let text = collapse_whitespace(&(source.text_extractor)(el)?);
    if text.chars().count() < MIN_TEXT_CHARS {
        return Err(ExtractError::TooShort);
    }

    // A headline without a working link is still worth delivering.
    let link = (source.link_resolver)(el, base).unwrap_or_else(|e| {
        tracing::debug!(target: "ingest", source = source.id, error = %e, "link not resolved");
        String::new()
    });

    Ok(Candidate { text, link })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::sources::{element_text, href_joined, lookup};

    fn hindu() -> &'static SourceDefinition {
        lookup("thehindu").unwrap()
    }

    #[test]
    fn single_anchor_resolves_against_source_url() {
        let html = r#"<html><body><h3 class="title"><a href="/news/1">Economy grows 6% this quarter</a></h3></body></html>"#;
        let out = extract(html, hindu()).unwrap();
        assert_eq!(
            out,
            vec![Candidate {
                text: "Economy grows 6% this quarter".into(),
                link: "https://www.thehindu.com/news/1".into(),
            }]
        );
    }

    #[test]
    fn short_texts_are_noise() {
        let html = r#"<h3 class="title"><a href="/a">  Home   </a></h3>
                      <h3 class="title"><a href="/b">123456789</a></h3>
                      <h3 class="title"><a href="/c">1234567890</a></h3>"#;
        let out = extract(html, hindu()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "1234567890");
    }

    #[test]
    fn whitespace_is_collapsed_and_trimmed() {
        let html = "<h3 class=\"title\"><a href=\"/x\">\n   Parliament\t passes\n\n <b>budget</b>  bill </a></h3>";
        let out = extract(html, hindu()).unwrap();
        assert_eq!(out[0].text, "Parliament passes budget bill");
    }

    #[test]
    fn missing_href_keeps_candidate_with_empty_link() {
        let html = r#"<h3 class="title"><a>Supreme Court hears election petition</a></h3>"#;
        let out = extract(html, hindu()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, "");
    }

    #[test]
    fn only_first_twenty_elements_are_considered() {
        let mut html = String::from("<div class=\"ContentDiv\">");
        for i in 0..30 {
            html.push_str(&format!("<a href=\"/r{i}\">Press release number {i}</a>"));
        }
        html.push_str("</div>");
        let out = extract(&html, lookup("pib").unwrap()).unwrap();
        assert_eq!(out.len(), MAX_ELEMENTS_PER_SOURCE);
        assert_eq!(out[19].text, "Press release number 19");
        assert_eq!(out[0].link, "https://pib.gov.in/r0");
    }

    #[test]
    fn malformed_markup_is_tolerated() {
        let html = r#"<div class="articles"><div class="title"><a href="/india/x">Farmer welfare scheme expanded<p><b>unclosed"#;
        let out = extract(html, lookup("indianexpress").unwrap()).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].text.starts_with("Farmer welfare scheme expanded"));
        assert_eq!(out[0].link, "https://indianexpress.com/india/x");
    }

    #[test]
    fn failing_text_rule_skips_only_that_element() {
        fn picky(el: ElementRef<'_>) -> Result<String, ExtractError> {
            if el.value().attr("data-bad").is_some() {
                return Err(ExtractError::EmptyText);
            }
            element_text(el)
        }
        let src = SourceDefinition {
            id: "test",
            fetch_url: "https://example.com/",
            item_selector: "a",
            text_extractor: picky,
            link_resolver: href_joined,
        };
        let html = r#"<a data-bad href="/1">First broken headline</a><a href="/2">Second good headline</a>"#;
        let out = extract(html, &src).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "Second good headline");
    }

    #[test]
    fn bad_selector_fails_the_page() {
        let src = SourceDefinition {
            item_selector: "a[[",
            ..*hindu()
        };
        assert!(matches!(extract("<a>x</a>", &src), Err(ExtractError::Selector(_))));
    }
}
