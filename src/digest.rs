// src/digest.rs
//! The daily job: aggregate, then mail the digest if anything matched.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::ingest::{self, scheduler::ScheduledJob, types::PageFetcher};
use crate::notify::DigestMailer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    /// Mail settings incomplete; nothing fetched.
    MailNotConfigured,
    NoItems,
    Delivered { items: usize },
}

/// Holds a snapshot of the config taken at registration time. A config
/// change builds a new job rather than mutating this one.
pub struct DigestJob {
    config: AppConfig,
    fetcher: Arc<dyn PageFetcher>,
    mailer: Arc<dyn DigestMailer>,
}

impl DigestJob {
    pub fn new(
        config: AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        mailer: Arc<dyn DigestMailer>,
    ) -> Self {
        Self {
            config,
            fetcher,
            mailer,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn execute(&self) -> Result<DigestOutcome> {
        let mail = self.config.mail();
        if !mail.is_complete() {
            tracing::info!(target: "mail", "email settings incomplete; skipping news email");
            return Ok(DigestOutcome::MailNotConfigured);
        }

        let result = ingest::run_once(&self.config, self.fetcher.as_ref())
            .await
            .context("aggregating news")?;
        for report in result.failed_sources() {
            tracing::warn!(
                target: "ingest",
                source = %report.source_id,
                error = report.error.as_deref().unwrap_or_default(),
                "source contributed nothing"
            );
        }
        if result.is_empty() {
            tracing::warn!(target: "mail", "no news items matched; no email sent");
            return Ok(DigestOutcome::NoItems);
        }

        self.mailer
            .send_digest(&mail, &result.items)
            .await
            .context("sending news email")?;
        Ok(DigestOutcome::Delivered {
            items: result.items.len(),
        })
    }
}

/// Manual send: fetch and deliver whatever matched, including an empty
/// digest. Unlike the scheduled job, incomplete mail settings are an error.
pub async fn send_now(
    config: &AppConfig,
    fetcher: &dyn PageFetcher,
    mailer: &dyn DigestMailer,
) -> Result<usize> {
    let mail = config.mail();
    mail.validate().context("email settings")?;
    let result = ingest::run_once(config, fetcher)
        .await
        .context("aggregating news")?;
    mailer
        .send_digest(&mail, &result.items)
        .await
        .context("sending news email")?;
    Ok(result.items.len())
}

#[async_trait]
impl ScheduledJob for DigestJob {
    async fn run(&self) -> Result<()> {
        let outcome = self.execute().await?;
        tracing::info!(target: "scheduler", ?outcome, "news email job done");
        Ok(())
    }
}
