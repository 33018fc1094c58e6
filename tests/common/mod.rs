// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use news_digest::config::MailSettings;
use news_digest::ingest::fetch::FetchError;
use news_digest::ingest::types::{NewsItem, PageFetcher};
use news_digest::notify::{DigestMailer, MailError};
use std::collections::HashMap;
use std::sync::Mutex;

pub const HINDU_URL: &str = "https://www.thehindu.com/news/national/";
pub const PIB_URL: &str = "https://pib.gov.in/PressReleasePage.aspx";
pub const EXPRESS_URL: &str = "https://indianexpress.com/section/india/";

pub const HINDU_PAGE: &str = include_str!("../fixtures/thehindu_national.html");
pub const PIB_PAGE: &str = include_str!("../fixtures/pib_releases.html");
pub const EXPRESS_PAGE: &str = include_str!("../fixtures/indianexpress_india.html");

/// Serves canned pages per URL and records every request.
#[derive(Default)]
pub struct CannedFetcher {
    pages: HashMap<String, Result<String, FetchError>>,
    pub calls: Mutex<Vec<String>>,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn failing(mut self, url: &str, err: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(err));
        self
    }

    /// All three built-in sources with their fixtures.
    pub fn all_fixtures() -> Self {
        Self::new()
            .page(HINDU_URL, HINDU_PAGE)
            .page(PIB_URL, PIB_PAGE)
            .page(EXPRESS_URL, EXPRESS_PAGE)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

/// Records what would have been sent instead of talking SMTP.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Vec<NewsItem>>>,
    pub fail_with: Option<MailError>,
}

impl RecordingMailer {
    pub fn failing(err: MailError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(err),
        }
    }

    pub fn sent(&self) -> Vec<Vec<NewsItem>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DigestMailer for RecordingMailer {
    async fn send_digest(&self, _settings: &MailSettings, items: &[NewsItem]) -> Result<(), MailError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        self.sent.lock().unwrap().push(items.to_vec());
        Ok(())
    }
}

pub fn strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}
