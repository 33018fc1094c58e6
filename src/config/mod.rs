// src/config/mod.rs
//! Application configuration: the flat settings document, its defaults,
//! load/save, and the mtime-polling hot reload watcher.

pub mod app;
pub mod watch;

pub use app::{AppConfig, MailSettings, SendTime};
pub use watch::spawn_config_watcher;

/// Invalid or missing settings. Always surfaced to the caller, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one news source must be configured")]
    NoSources,
    #[error("email configuration missing required field: {0}")]
    MissingMailField(&'static str),
    #[error("invalid email address format: {0}")]
    InvalidRecipient(String),
    #[error("invalid SMTP port: {0}")]
    InvalidPort(i64),
    #[error("invalid send_time format: {0:?} (expected HH:MM)")]
    InvalidSendTime(String),
}
