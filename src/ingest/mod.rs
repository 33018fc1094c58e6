// src/ingest/mod.rs
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod health;
pub mod scheduler;
pub mod sources;
pub mod types;

use chrono::{Local, NaiveDate};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::config::{AppConfig, ConfigError};
use crate::ingest::fetch::FetchError;
use crate::ingest::filter::KeywordFilter;
use crate::ingest::sources::{SourceDefinition, SOURCES};
use crate::ingest::types::{
    AggregationResult, Candidate, NewsItem, PageFetcher, SourceReport, DEFAULT_CATEGORY,
};

/// Accepted (keyword-matching) items per source.
pub const MAX_ITEMS_PER_SOURCE: usize = 10;
/// Titles are cut to this many code points.
pub const MAX_TITLE_CHARS: usize = 500;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_runs_total", "Aggregation pipeline runs.");
        describe_counter!("digest_items_total", "News items accepted across runs.");
        describe_counter!(
            "digest_source_errors_total",
            "Sources that failed to fetch or extract."
        );
    });
}

/// Collapse whitespace runs (including NBSP) to one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(s, " ").trim().to_string()
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Keyword-filter one source's candidates in page order, stopping once the
/// per-source cap is reached.
pub fn accept_candidates(
    source_id: &str,
    candidates: Vec<Candidate>,
    filter: &KeywordFilter,
    date: &str,
) -> Vec<NewsItem> {
    let mut out = Vec::new();

    for c in candidates {
        if out.len() >= MAX_ITEMS_PER_SOURCE {
            break;
        }
        if !filter.matches(&c.text) {
            continue;
        }
        out.push(NewsItem {
            source_id: source_id.to_uppercase(),
            title: truncate_chars(&c.text, MAX_TITLE_CHARS),
            link: c.link,
            date: date.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
        });
    }
    out
}

/// Run the pipeline against the built-in source table, stamped with today's
/// local date.
pub async fn run_once(
    cfg: &AppConfig,
    fetcher: &dyn PageFetcher,
) -> Result<AggregationResult, ConfigError> {
    run_with(
        SOURCES,
        &cfg.sources,
        &cfg.keywords,
        fetcher,
        Local::now().date_naive(),
    )
    .await
}

/// Fetch → extract → filter each configured source in order. Only an empty
/// source list is an error; a source that fails contributes nothing and
/// the run moves on.
pub async fn run_with(
    registry: &[SourceDefinition],
    sources: &[String],
    keywords: &[String],
    fetcher: &dyn PageFetcher,
    today: NaiveDate,
) -> Result<AggregationResult, ConfigError> {
    ensure_metrics_described();

    if sources.iter().all(|s| s.trim().is_empty()) {
        return Err(ConfigError::NoSources);
    }
    let filter = KeywordFilter::new(keywords);
    if filter.is_empty() {
        tracing::warn!(target: "ingest", "no usable keywords; nothing can match");
        return Ok(AggregationResult::default());
    }

    counter!("digest_runs_total").increment(1);
    let date = today.format("%Y-%m-%d").to_string();
    let mut result = AggregationResult::default();

    for id in sources {
        let Some(def) = sources::find_in(registry, id) else {
            tracing::warn!(target: "ingest", source = %id, "skipping unknown source");
            continue;
        };
        tracing::info!(target: "ingest", source = def.id, "scraping");

        let (mut items, report) = run_source(def, &filter, fetcher, &date).await;
        if report.error.is_some() {
            counter!("digest_source_errors_total").increment(1);
        }
        result.items.append(&mut items);
        result.reports.push(report);
    }

    counter!("digest_items_total").increment(result.items.len() as u64);
    tracing::info!(target: "ingest", total = result.items.len(), "aggregation finished");
    Ok(result)
}

async fn run_source(
    def: &SourceDefinition,
    filter: &KeywordFilter,
    fetcher: &dyn PageFetcher,
    date: &str,
) -> (Vec<NewsItem>, SourceReport) {
    let mut report = SourceReport {
        source_id: def.id.to_string(),
        ..SourceReport::default()
    };

    let markup = match fetcher.fetch(def.fetch_url).await {
        Ok(m) => m,
        Err(e) => {
            log_fetch_error(def.id, &e);
            report.error = Some(e.to_string());
            return (Vec::new(), report);
        }
    };

    let candidates = match extract::extract(&markup, def) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(target: "ingest", source = def.id, error = %e, "extraction failed");
            report.error = Some(e.to_string());
            return (Vec::new(), report);
        }
    };
    if candidates.is_empty() {
        tracing::warn!(
            target: "ingest",
            source = def.id,
            "no items found; selectors may need updating"
        );
    }

    report.candidates = candidates.len();
    let items = accept_candidates(def.id, candidates, filter, date);
    report.accepted = items.len();
    tracing::info!(
        target: "ingest",
        source = def.id,
        candidates = report.candidates,
        accepted = report.accepted,
        "source processed"
    );
    (items, report)
}

fn log_fetch_error(source: &str, e: &FetchError) {
    match e {
        FetchError::Timeout => {
            tracing::error!(target: "ingest", source, "timeout while fetching")
        }
        FetchError::Connect(msg) => {
            tracing::error!(target: "ingest", source, error = %msg, "connection error while fetching")
        }
        FetchError::Status(code) => {
            tracing::error!(target: "ingest", source, status = code, "HTTP error while fetching")
        }
        FetchError::Transport(msg) => {
            tracing::error!(target: "ingest", source, error = %msg, "request error while fetching")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(text: &str) -> Candidate {
        Candidate {
            text: text.into(),
            link: String::new(),
        }
    }

    #[test]
    fn collapse_whitespace_folds_nbsp_and_newlines() {
        assert_eq!(collapse_whitespace("  A\u{00A0}\n\tB   C "), "A B C");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn truncate_counts_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        let long = "अ".repeat(600);
        assert_eq!(truncate_chars(&long, MAX_TITLE_CHARS).chars().count(), 500);
    }

    #[test]
    fn cap_at_ten_per_source() {
        let f = KeywordFilter::new(&["policy"]);
        let cands: Vec<_> = (0..18).map(|i| cand(&format!("New policy number {i}"))).collect();
        let out = accept_candidates("pib", cands, &f, "2026-10-16");
        assert_eq!(out.len(), MAX_ITEMS_PER_SOURCE);
        assert_eq!(out[9].title, "New policy number 9");
        assert!(out.iter().all(|i| i.source_id == "PIB" && i.category == "general"));
    }

    #[test]
    fn repeated_headline_is_kept_each_time_it_matches() {
        let f = KeywordFilter::new(&["budget"]);
        let cands = vec![
            cand("Budget session begins today"),
            cand("budget session begins today"),
            cand("Unrelated sports headline"),
            cand("Budget allocations for rural roads"),
        ];
        let out = accept_candidates("thehindu", cands, &f, "2026-10-16");
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Budget session begins today",
                "budget session begins today",
                "Budget allocations for rural roads"
            ]
        );
    }
}
