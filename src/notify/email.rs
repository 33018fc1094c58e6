// src/notify/email.rs
use async_trait::async_trait;
use chrono::Local;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{Address, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use super::render::{render_digest, SENDER_NAME};
use crate::config::{ConfigError, MailSettings};
use crate::ingest::types::NewsItem;

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailErrorKind {
    Invalid,
    Authentication,
    RecipientRefused,
    Disconnected,
    Transport,
}

/// Human-readable, password-free causes for the caller or the log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("email configuration error: {0}")]
    Invalid(#[from] ConfigError),
    #[error("email authentication failed; check the username and password")]
    Authentication,
    #[error("email recipient was refused; check the email address")]
    RecipientRefused,
    #[error("connection to the email server was lost; please try again")]
    Disconnected,
    #[error("failed to send email: {0}")]
    Transport(String),
}

impl MailError {
    pub fn kind(&self) -> MailErrorKind {
        match self {
            MailError::Invalid(_) => MailErrorKind::Invalid,
            MailError::Authentication => MailErrorKind::Authentication,
            MailError::RecipientRefused => MailErrorKind::RecipientRefused,
            MailError::Disconnected => MailErrorKind::Disconnected,
            MailError::Transport(_) => MailErrorKind::Transport,
        }
    }

    fn from_smtp(e: lettre::transport::smtp::Error, password: &str) -> Self {
        if let Some(code) = e.status() {
            let numeric: u16 = code.to_string().parse().unwrap_or(0);
            return match classify_reply_code(numeric) {
                MailErrorKind::Authentication => MailError::Authentication,
                MailErrorKind::RecipientRefused => MailError::RecipientRefused,
                MailErrorKind::Disconnected => MailError::Disconnected,
                _ => MailError::Transport(scrub(&e.to_string(), password)),
            };
        }
        if e.is_timeout() || is_session_drop(&e) {
            return MailError::Disconnected;
        }
        MailError::Transport(scrub(&e.to_string(), password))
    }
}

/// Map an SMTP reply code to a failure category.
pub fn classify_reply_code(code: u16) -> MailErrorKind {
    match code {
        // auth required / mechanism too weak / bad credentials / temp auth failure
        530 | 534 | 535 | 454 => MailErrorKind::Authentication,
        // mailbox unavailable / not local / name not allowed
        550 | 551 | 553 => MailErrorKind::RecipientRefused,
        // service closing transmission channel
        421 => MailErrorKind::Disconnected,
        _ => MailErrorKind::Transport,
    }
}

fn is_session_drop(e: &lettre::transport::smtp::Error) -> bool {
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

/// Replace any occurrence of the secret in a server-supplied message.
fn scrub(msg: &str, secret: &str) -> String {
    if secret.is_empty() {
        return msg.to_string();
    }
    msg.replace(secret, "<redacted>")
}

/// Assemble the multipart/alternative digest message. The SMTP username is
/// used as sender when it is an address, otherwise the recipient is.
pub fn build_message(settings: &MailSettings, items: &[NewsItem]) -> Result<Message, MailError> {
    let to: Mailbox = settings
        .recipient
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidRecipient(settings.recipient.clone()))?;
    let from_addr: Address = settings
        .username
        .trim()
        .parse()
        .unwrap_or_else(|_| to.email.clone());
    let from = Mailbox::new(Some(SENDER_NAME.to_string()), from_addr);

    let digest = render_digest(items, Local::now());
    Message::builder()
        .from(from.clone())
        .reply_to(from)
        .to(to)
        .subject(digest.subject)
        .multipart(MultiPart::alternative_plain_html(digest.plain, digest.html))
        .map_err(|e| MailError::Transport(format!("building message: {e}")))
}

/// Delivers a digest. `SmtpMailer` is the real one; tests record calls.
#[async_trait]
pub trait DigestMailer: Send + Sync {
    async fn send_digest(&self, settings: &MailSettings, items: &[NewsItem])
        -> Result<(), MailError>;
}

/// STARTTLS + AUTH submission. One session per send; lettre quits it on
/// success and drops it on every error path.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    timeout: Duration,
}

impl Default for SmtpMailer {
    fn default() -> Self {
        Self {
            timeout: SMTP_TIMEOUT,
        }
    }
}

impl SmtpMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn transport(
        &self,
        settings: &MailSettings,
        port: u16,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(settings.server.trim())
            .map_err(|e| MailError::from_smtp(e, &settings.password))?;
        Ok(builder
            .port(port)
            .credentials(creds)
            .timeout(Some(self.timeout))
            .build())
    }

    /// Open a session, upgrade, authenticate, and quit without sending.
    pub async fn check_connection(&self, settings: &MailSettings) -> Result<(), MailError> {
        let port = settings.validate()?;
        let mailer = self.transport(settings, port)?;
        tracing::info!(target: "mail", server = %settings.server, port, "testing mail connection");
        match mailer.test_connection().await {
            Ok(true) => {
                tracing::info!(target: "mail", "mail connection test succeeded");
                Ok(())
            }
            Ok(false) => Err(MailError::Disconnected),
            Err(e) => {
                let err = MailError::from_smtp(e, &settings.password);
                tracing::error!(target: "mail", error = %err, "mail connection test failed");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl DigestMailer for SmtpMailer {
    async fn send_digest(
        &self,
        settings: &MailSettings,
        items: &[NewsItem],
    ) -> Result<(), MailError> {
        let port = settings.validate().map_err(|e| {
            tracing::error!(target: "mail", error = %e, "email configuration error");
            MailError::from(e)
        })?;
        tracing::info!(target: "mail", count = items.len(), "preparing news email");

        let msg = build_message(settings, items)?;
        let mailer = self.transport(settings, port)?;

        tracing::info!(target: "mail", server = %settings.server, port, "connecting to SMTP server");
        match mailer.send(msg).await {
            Ok(_) => {
                tracing::info!(target: "mail", recipient = %settings.recipient, "news email sent");
                Ok(())
            }
            Err(e) => {
                let err = MailError::from_smtp(e, &settings.password);
                tracing::error!(target: "mail", kind = ?err.kind(), error = %err, "news email failed");
                Err(err)
            }
        }
    }
}
