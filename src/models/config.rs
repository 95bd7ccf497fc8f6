//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Session;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP, retry and worker pool settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Registration session to query
    #[serde(default)]
    pub session: SessionConfig,

    /// Page parsing settings
    #[serde(default)]
    pub parser: ParserConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.base_url.trim().is_empty() {
            return Err(AppError::validation("crawler.base_url is empty"));
        }
        url::Url::parse(&self.crawler.base_url)?;
        if !self.crawler.randomize_user_agent && self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_retries == 0 {
            return Err(AppError::validation("crawler.max_retries must be > 0"));
        }
        if self.crawler.workers == 0 {
            return Err(AppError::validation("crawler.workers must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.session.term.trim().is_empty() || self.session.campus.trim().is_empty() {
            return Err(AppError::validation("session.term and session.campus are required"));
        }
        if self.parser.not_offered_sentinel.is_empty() {
            return Err(AppError::validation("parser.not_offered_sentinel is empty"));
        }
        Selector::parse(&self.parser.seat_selector).map_err(|e| {
            AppError::validation(format!(
                "parser.seat_selector '{}' is invalid: {e:?}",
                self.parser.seat_selector
            ))
        })?;
        Ok(())
    }
}

/// HTTP client, retry and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Course schedule endpoint all request URLs are built from
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header when randomization is off
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Pick a new client identity for every attempt
    #[serde(default = "defaults::randomize_user_agent")]
    pub randomize_user_agent: bool,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per URL before giving up
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Backoff after the first failure is base + step, then grows by step
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(default = "defaults::backoff_step")]
    pub backoff_step_ms: u64,

    /// Number of pool workers
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Stop the whole run on the first job failure
    #[serde(default)]
    pub fail_fast: bool,
}

impl CrawlerConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            randomize_user_agent: defaults::randomize_user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_step_ms: defaults::backoff_step(),
            workers: defaults::workers(),
            max_concurrent: defaults::max_concurrent(),
            fail_fast: false,
        }
    }
}

/// Registration session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "defaults::term")]
    pub term: String,

    /// Defaults to the current calendar year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,

    #[serde(default = "defaults::campus")]
    pub campus: String,
}

impl SessionConfig {
    /// Resolve into a concrete session.
    pub fn session(&self) -> Session {
        let year = self
            .year
            .clone()
            .unwrap_or_else(|| Session::current().year);
        Session::new(self.term.clone(), year, self.campus.clone())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            term: defaults::term(),
            year: None,
            campus: defaults::campus(),
        }
    }
}

/// Page parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Text shown on a page whose course or department is not offered
    #[serde(default = "defaults::not_offered_sentinel")]
    pub not_offered_sentinel: String,

    /// Selector for the emphasized nodes holding seat counts
    #[serde(default = "defaults::seat_selector")]
    pub seat_selector: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            not_offered_sentinel: defaults::not_offered_sentinel(),
            seat_selector: defaults::seat_selector(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn base_url() -> String {
        "https://courses.students.ubc.ca/cs/courseschedule".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; seat-crawler/0.1)".into()
    }
    pub fn randomize_user_agent() -> bool {
        true
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        10
    }
    pub fn backoff_base() -> u64 {
        2000
    }
    pub fn backoff_step() -> u64 {
        1500
    }
    pub fn workers() -> usize {
        60
    }
    pub fn max_concurrent() -> usize {
        60
    }

    // Session defaults
    pub fn term() -> String {
        "W".into()
    }
    pub fn campus() -> String {
        "UBC".into()
    }

    // Parser defaults
    pub fn not_offered_sentinel() -> String {
        "The requested course is either no longer offered".into()
    }
    pub fn seat_selector() -> String {
        "strong".into()
    }
}
