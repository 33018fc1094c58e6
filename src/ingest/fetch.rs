// src/ingest/fetch.rs
use async_trait::async_trait;
use std::time::Duration;

use super::types::PageFetcher;

/// A desktop browser UA; some listing pages refuse obvious bots.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const MAX_ATTEMPTS: u8 = 3;
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection error: {0}")]
    Connect(String),
    #[error("HTTP error {0}")]
    Status(u16),
    #[error("request error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Timeouts, connection failures/resets, 429 and the 5xx gateway family
    /// are worth another attempt; any other HTTP status is final.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connect(_) => true,
            FetchError::Status(code) => is_transient_status(*code),
            FetchError::Transport(_) => false,
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() || is_connection_drop(&e) {
            FetchError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

pub fn is_transient_status(code: u16) -> bool {
    matches!(code, 429 | 500 | 502 | 503 | 504)
}

/// Peer reset/closed the socket mid-exchange.
fn is_connection_drop(e: &reqwest::Error) -> bool {
    use std::error::Error as _;
    use std::io::ErrorKind;

    let mut src = e.source();
    while let Some(inner) = src {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            );
        }
        src = inner.source();
    }
    false
}

/// Delay before attempt `failed + 1`: base, 2×base, 4×base, ...
pub fn backoff_delay(base: Duration, failed: u8) -> Duration {
    base * 2u32.saturating_pow(u32::from(failed.saturating_sub(1)))
}

/// reqwest-backed fetcher with retry on transient failures.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_attempts: u8,
    backoff_base: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(FETCH_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Use a pre-built client (proxy settings, test servers). The browser
    /// UA is set per request, so any client gets it.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: FETCH_TIMEOUT,
            max_attempts: MAX_ATTEMPTS,
            backoff_base: BACKOFF_BASE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let rsp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        rsp.text().await.map_err(FetchError::from_reqwest)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = backoff_delay(self.backoff_base, attempt);
                    tracing::warn!(
                        target: "ingest",
                        %url, attempt, error = %e, delay_ms = delay.as_millis() as u64,
                        "transient fetch failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
