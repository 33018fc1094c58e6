// src/ingest/health.rs
//! Reachability check for every registered source: one fetch each, no
//! extraction or filtering. Used by the `check-sources` command.

use serde::Serialize;
use std::time::Duration;

use super::fetch::FetchError;
use super::sources::{SourceDefinition, SOURCES};
use super::types::PageFetcher;

/// Per-request timeout for a reachability check.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCheck {
    pub source_id: String,
    pub url: String,
    pub status: CheckStatus,
    /// 200 on success; the server's answer when it replied with an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Body length in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceCheck {
    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// Check every built-in source, in registry order.
pub async fn check_sources(fetcher: &dyn PageFetcher) -> Vec<SourceCheck> {
    check_sources_in(SOURCES, fetcher).await
}

pub async fn check_sources_in(
    registry: &[SourceDefinition],
    fetcher: &dyn PageFetcher,
) -> Vec<SourceCheck> {
    let mut out = Vec::with_capacity(registry.len());
    for source in registry {
        let check = match fetcher.fetch(source.fetch_url).await {
            Ok(body) => {
                tracing::info!(
                    target: "ingest",
                    source = source.id, bytes = body.len(),
                    "source reachable"
                );
                SourceCheck {
                    source_id: source.id.to_string(),
                    url: source.fetch_url.to_string(),
                    status: CheckStatus::Ok,
                    status_code: Some(200),
                    content_length: Some(body.len()),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    source = source.id, url = source.fetch_url, error = %e,
                    "source unreachable"
                );
                let status_code = match e {
                    FetchError::Status(code) => Some(code),
                    _ => None,
                };
                SourceCheck {
                    source_id: source.id.to_string(),
                    url: source.fetch_url.to_string(),
                    status: CheckStatus::Error,
                    status_code,
                    content_length: None,
                    error: Some(e.to_string()),
                }
            }
        };
        out.push(check);
    }
    out
}
