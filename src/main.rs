//! News digest binary.
//! Loads the config, then either runs the daily scheduler or performs one
//! manual action (fetch, send, mail check) and exits.

mod cli;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_digest::config::app::resolve_config_path;
use news_digest::config::spawn_config_watcher;
use news_digest::ingest::{self, health, scheduler::next_fire_after};
use news_digest::notify::render::render_plain;
use news_digest::{
    digest, AppConfig, DeliveryScheduler, DigestJob, DigestMailer, HttpFetcher, PageFetcher,
    SmtpMailer,
};

use crate::cli::{Cli, Command};

/// Logs go to stderr so `fetch` output stays clean on stdout.
/// `NEWS_DIGEST_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("NEWS_DIGEST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let path = match cli.config {
        Some(p) => p,
        None => resolve_config_path()?,
    };
    let cfg = AppConfig::load_or_default(&path)?;
    tracing::debug!(target: "config", ?cfg, "config loaded");

    match cli.command {
        Command::Run => run(path, cfg).await,
        Command::Fetch { json } => fetch(&cfg, json).await,
        Command::Send => {
            let fetcher = HttpFetcher::new()?;
            let n = digest::send_now(&cfg, &fetcher, &SmtpMailer::new()).await?;
            println!("Sent digest with {n} items to {}", cfg.email);
            Ok(())
        }
        Command::TestMail => {
            SmtpMailer::new().check_connection(&cfg.mail()).await?;
            println!("Mail connection OK");
            Ok(())
        }
        Command::NextRun => {
            let at = cfg.schedule()?;
            let next = next_fire_after(&Local::now(), at);
            println!("{}", next.format("%Y-%m-%d %H:%M %Z"));
            Ok(())
        }
        Command::CheckSources { json } => check_sources(json).await,
    }
}

async fn check_sources(json: bool) -> Result<()> {
    let fetcher = HttpFetcher::new()?
        .with_timeout(health::CHECK_TIMEOUT)
        .with_retries(1);
    let checks = health::check_sources(&fetcher).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&checks)?);
        return Ok(());
    }
    for c in &checks {
        if c.is_ok() {
            println!(
                "{:<14} OK     {} ({} bytes)",
                c.source_id,
                c.status_code.unwrap_or_default(),
                c.content_length.unwrap_or_default()
            );
        } else {
            println!(
                "{:<14} ERROR  {}",
                c.source_id,
                c.error.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn fetch(cfg: &AppConfig, json: bool) -> Result<()> {
    let fetcher = HttpFetcher::new()?;
    let result = ingest::run_once(cfg, &fetcher).await?;
    for r in result.failed_sources() {
        eprintln!(
            "{}: failed ({})",
            r.source_id,
            r.error.as_deref().unwrap_or_default()
        );
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&result.items)?);
    } else {
        println!("{}", render_plain(&result.items, Local::now()));
    }
    Ok(())
}

async fn run(path: PathBuf, cfg: AppConfig) -> Result<()> {
    let at = cfg.schedule().context("send_time")?;
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new()?);
    let mailer: Arc<dyn DigestMailer> = Arc::new(SmtpMailer::new());
    if !cfg.mail().is_complete() {
        tracing::warn!(target: "mail", "email settings incomplete; scheduled runs will be skipped");
    }

    let scheduler = Arc::new(DeliveryScheduler::new());
    scheduler.schedule(
        at,
        Arc::new(DigestJob::new(cfg, Arc::clone(&fetcher), Arc::clone(&mailer))),
    );
    tracing::info!(
        target: "scheduler",
        next_run = %next_fire_after(&Local::now(), at),
        "waiting for first delivery"
    );

    let watcher = {
        let scheduler = Arc::clone(&scheduler);
        spawn_config_watcher(path, move |cfg: AppConfig| match cfg.schedule() {
            Ok(at) => scheduler.schedule(
                at,
                Arc::new(DigestJob::new(cfg, Arc::clone(&fetcher), Arc::clone(&mailer))),
            ),
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "invalid send_time; keeping previous schedule")
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("shutdown requested");
    watcher.abort();
    scheduler.shutdown().await;
    Ok(())
}
