// src/notify/render.rs
//! Digest bodies: a plain-text part and an HTML part grouped by source.
//! Both render a "no items" notice for an empty digest.

use chrono::{DateTime, Local};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

use crate::ingest::types::NewsItem;

pub const DIGEST_TITLE: &str = "Daily News Digest";
pub const SENDER_NAME: &str = "News Digest";
const NO_ITEMS: &str = "No news items matched your keywords today.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

pub fn render_digest(items: &[NewsItem], now: DateTime<Local>) -> RenderedDigest {
    RenderedDigest {
        subject: subject_line(items.len(), now),
        plain: render_plain(items, now),
        html: render_html(items, now),
    }
}

pub fn subject_line(count: usize, now: DateTime<Local>) -> String {
    let mut s = format!("{DIGEST_TITLE} - {}", now.format("%d %B %Y"));
    if count == 0 {
        s.push_str(" (No Items)");
    }
    s
}

/// Sources in first-appearance order, each with its items.
pub fn group_by_source(items: &[NewsItem]) -> Vec<(&str, Vec<&NewsItem>)> {
    let mut groups: Vec<(&str, Vec<&NewsItem>)> = Vec::new();
    for it in items {
        match groups.iter_mut().find(|(s, _)| *s == it.source_id) {
            Some((_, v)) => v.push(it),
            None => groups.push((it.source_id.as_str(), vec![it])),
        }
    }
    groups
}

fn summary_line(items: &[NewsItem]) -> String {
    let sources = group_by_source(items).len();
    format!(
        "Found {} relevant news {} from {} {}.",
        items.len(),
        if items.len() == 1 { "item" } else { "items" },
        sources,
        if sources == 1 { "source" } else { "sources" },
    )
}

pub fn render_plain(items: &[NewsItem], now: DateTime<Local>) -> String {
    let mut out = format!("{DIGEST_TITLE} - {}\n\n", now.format("%d %B %Y"));
    if items.is_empty() {
        out.push_str(NO_ITEMS);
        out.push_str("\n\n");
    } else {
        out.push_str(&summary_line(items));
        out.push_str("\n\n");
        for it in items {
            let _ = writeln!(out, "• {}: {}", it.source_id, it.title);
            if !it.link.is_empty() {
                let _ = writeln!(out, "  Link: {}", it.link);
            }
            out.push('\n');
        }
    }
    let _ = write!(out, "This email was sent automatically by {SENDER_NAME}.");
    out
}

const STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; margin: 20px; }
h2 { color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 10px; }
h3 { color: #34495e; margin-top: 25px; }
.news-item { margin: 15px 0; padding: 10px; border-left: 4px solid #3498db; background-color: #f8f9fa; }
.news-title { font-weight: bold; margin-bottom: 5px; }
.news-link { color: #2980b9; text-decoration: none; }
.summary { background-color: #e8f6f3; padding: 15px; margin-bottom: 20px; border-radius: 5px; }
.footer { margin-top: 30px; padding-top: 15px; border-top: 1px solid #bdc3c7; font-size: 12px; color: #7f8c8d; }";

pub fn render_html(items: &[NewsItem], now: DateTime<Local>) -> String {
    let mut out = String::with_capacity(2048 + items.len() * 256);
    let _ = write!(
        out,
        "<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{STYLE}\n</style>\n</head>\n<body>\n<h2>{DIGEST_TITLE}</h2>\n"
    );

    if items.is_empty() {
        let _ = writeln!(out, "<p>{NO_ITEMS}</p>");
    } else {
        let _ = writeln!(
            out,
            "<div class=\"summary\"><strong>Summary:</strong> {}</div>",
            summary_line(items)
        );
        for (source, group) in group_by_source(items) {
            let _ = writeln!(
                out,
                "<h3>{} ({} {})</h3>",
                encode_text(source),
                group.len(),
                if group.len() == 1 { "item" } else { "items" }
            );
            for it in group {
                let title = encode_text(&it.title);
                if it.link.is_empty() {
                    let _ = writeln!(
                        out,
                        "<div class=\"news-item\"><div class=\"news-title\">{title}</div></div>"
                    );
                } else {
                    let _ = writeln!(
                        out,
                        "<div class=\"news-item\"><div class=\"news-title\"><a href=\"{}\" class=\"news-link\" target=\"_blank\">{title}</a></div></div>",
                        encode_double_quoted_attribute(&it.link)
                    );
                }
            }
        }
    }

    let _ = write!(
        out,
        "<div class=\"footer\">\n<p><em>This email was sent automatically by {SENDER_NAME} on {}</em></p>\n\
<p>To stop receiving these emails, clear the email settings in the application.</p>\n</div>\n</body>\n</html>\n",
        now.format("%d %B %Y at %I:%M %p")
    );
    out
}
