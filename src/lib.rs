// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod digest;
pub mod ingest;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::config::{AppConfig, ConfigError, MailSettings, SendTime};
pub use crate::digest::{DigestJob, DigestOutcome};
pub use crate::ingest::fetch::{FetchError, HttpFetcher};
pub use crate::ingest::scheduler::{DeliveryScheduler, FireOutcome, ScheduledJob, SchedulerStatus};
pub use crate::ingest::types::{AggregationResult, NewsItem, PageFetcher};
pub use crate::notify::{DigestMailer, MailError, MailErrorKind, SmtpMailer};
