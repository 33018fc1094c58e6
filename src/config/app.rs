// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::ConfigError;

pub const ENV_CONFIG_PATH: &str = "NEWS_DIGEST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

const DEFAULT_KEYWORDS: &[&str] = &[
    "UPSC",
    "IAS",
    "IPS",
    "IFS",
    "civil services",
    "government",
    "policy",
    "governance",
    "economy",
    "economic",
    "GDP",
    "inflation",
    "budget",
    "finance",
    "banking",
    "environment",
    "climate",
    "pollution",
    "conservation",
    "biodiversity",
    "international relations",
    "diplomacy",
    "foreign policy",
    "trade",
    "science",
    "technology",
    "innovation",
    "research",
    "space",
    "security",
    "defence",
    "military",
    "terrorism",
    "cyber",
    "education",
    "health",
    "welfare",
    "social",
    "poverty",
    "constitution",
    "supreme court",
    "parliament",
    "election",
    "agriculture",
    "farmer",
    "rural",
    "infrastructure",
    "transport",
];

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}
fn default_smtp_port() -> i64 {
    587
}
fn default_send_time() -> String {
    "07:00".to_string()
}
fn default_sources() -> Vec<String> {
    vec!["thehindu".into(), "pib".into(), "indianexpress".into()]
}
fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

/// The settings document. Every key is optional on disk; missing keys take
/// the defaults below.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,
    /// Kept signed and unvalidated here; the mail sender range-checks it.
    #[serde(default = "default_smtp_port", deserialize_with = "lenient_port")]
    pub smtp_port: i64,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_send_time")]
    pub send_time: String,
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            send_time: default_send_time(),
            sources: default_sources(),
            keywords: default_keywords(),
        }
    }
}

// Never print the password.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("email", &self.email)
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &redacted(&self.smtp_password))
            .field("send_time", &self.send_time)
            .field("sources", &self.sources)
            .field("keywords", &self.keywords)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// A port that is not an integer (string, float, bool) becomes 0 so that
/// validation reports `InvalidPort` instead of the whole document failing.
fn lenient_port<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Int(i64),
        Other(serde::de::IgnoredAny),
    }
    Ok(match PortRepr::deserialize(deserializer)? {
        PortRepr::Int(p) => p,
        PortRepr::Other(_) => 0,
    })
}

impl AppConfig {
    pub fn schedule(&self) -> Result<SendTime, ConfigError> {
        self.send_time.parse()
    }

    pub fn mail(&self) -> MailSettings {
        MailSettings {
            recipient: self.email.clone(),
            server: self.smtp_server.clone(),
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
        }
    }

    /// Load from an explicit path. `.toml` files are parsed as TOML,
    /// everything else as JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext).with_context(|| format!("parsing {}", path.display()))
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        if hint_ext == "toml" {
            return Ok(toml::from_str(s)?);
        }
        Ok(serde_json::from_str(s)?)
    }

    /// Load `path`, or fall back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        tracing::info!(path = %path.display(), "no config file; using defaults");
        Ok(Self::default())
    }

    /// `$NEWS_DIGEST_CONFIG`, else `./config.json`, else defaults.
    pub fn load_default() -> Result<Self> {
        Self::load_or_default(&resolve_config_path()?)
    }

    /// Write as pretty JSON, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating config dir {}", dir.display()))?;
        }
        let body = serde_json::to_string_pretty(self)?;
        fs::write(path, body).with_context(|| format!("writing config to {}", path.display()))
    }
}

/// Resolve the config path:
/// 1) $NEWS_DIGEST_CONFIG (must exist)
/// 2) ./config.json
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Mail-related slice of the config, handed to the mail sender.
#[derive(Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub recipient: String,
    pub server: String,
    pub port: i64,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("recipient", &self.recipient)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .finish()
    }
}

impl MailSettings {
    /// All credential fields present. Says nothing about their shape.
    pub fn is_complete(&self) -> bool {
        self.missing_field().is_none()
    }

    fn missing_field(&self) -> Option<&'static str> {
        if self.recipient.trim().is_empty() {
            Some("email")
        } else if self.server.trim().is_empty() {
            Some("smtp_server")
        } else if self.port == 0 {
            Some("smtp_port")
        } else if self.username.trim().is_empty() {
            Some("smtp_username")
        } else if self.password.is_empty() {
            Some("smtp_password")
        } else {
            None
        }
    }

    /// Completeness, recipient shape, then port range. Returns the port
    /// narrowed to `u16` on success.
    pub fn validate(&self) -> Result<u16, ConfigError> {
        if let Some(field) = self.missing_field() {
            return Err(ConfigError::MissingMailField(field));
        }
        if !looks_like_address(&self.recipient) {
            return Err(ConfigError::InvalidRecipient(self.recipient.clone()));
        }
        match u16::try_from(self.port) {
            Ok(p) if p >= 1 => Ok(p),
            _ => Err(ConfigError::InvalidPort(self.port)),
        }
    }
}

/// Superficial shape check: an `@`, and a `.` in the part right after it.
pub fn looks_like_address(addr: &str) -> bool {
    addr.split('@')
        .nth(1)
        .map(|domain| domain.contains('.'))
        .unwrap_or(false)
}

/// Daily fire time, local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendTime {
    pub hour: u32,
    pub minute: u32,
}

impl SendTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ConfigError> {
        if hour > 23 || minute > 59 {
            return Err(ConfigError::InvalidSendTime(format!("{hour}:{minute}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn as_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for SendTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::InvalidSendTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
        let hour: u32 = h.trim().parse().map_err(|_| bad())?;
        let minute: u32 = m.trim().parse().map_err(|_| bad())?;
        Self::new(hour, minute).map_err(|_| bad())
    }
}

impl fmt::Display for SendTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
