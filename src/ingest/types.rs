// src/ingest/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::fetch::FetchError;

/// Category stamped on every item produced by the daily pipeline.
pub const DEFAULT_CATEGORY: &str = "general";

/// A (text, link) pair pulled off a listing page, before keyword filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    /// Absolute URL, or empty when the element's link could not be resolved.
    pub link: String,
}

/// A keyword-matched candidate stamped with its source and fetch date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub source_id: String, // uppercased, e.g. "THEHINDU"
    pub title: String,
    pub link: String,
    pub date: String, // YYYY-MM-DD
    pub category: String,
}

/// Diagnostics for one source in one run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SourceReport {
    pub source_id: String,
    pub candidates: usize,
    pub accepted: usize,
    pub error: Option<String>,
}

/// Output of one pipeline run. Items keep configured source order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationResult {
    pub items: Vec<NewsItem>,
    pub reports: Vec<SourceReport>,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|r| r.error.is_some())
    }
}

/// Retrieves raw markup for a URL. The HTTP implementation lives in
/// `ingest::fetch`; tests substitute canned pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
