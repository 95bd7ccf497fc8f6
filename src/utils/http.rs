// src/utils/http.rs

//! HTTP fetching with bounded retries.
//!
//! Both fetchers share one [`RetryPolicy`]: consecutive connection failures
//! within a single call are counted (never reset), each failure short of the
//! limit is followed by a linearly growing sleep, and the failure that reaches
//! the limit raises [`AppError::Fetch`]. Any other error returns immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

// --- Client identity ---

/// Produces the User-Agent sent with each attempt.
pub trait HeaderStrategy: Send + Sync {
    fn user_agent(&self) -> String;
}

/// A different browser-like identity per attempt, to avoid uniform blocking.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomAgent;

impl HeaderStrategy for RandomAgent {
    fn user_agent(&self) -> String {
        format!("Mozilla {}.0", rand::thread_rng().gen_range(1..=6))
    }
}

/// The same identity on every attempt.
#[derive(Debug, Clone)]
pub struct FixedAgent(pub String);

impl HeaderStrategy for FixedAgent {
    fn user_agent(&self) -> String {
        self.0.clone()
    }
}

/// Pick the header strategy configured for the crawler.
pub fn header_strategy(config: &CrawlerConfig) -> Arc<dyn HeaderStrategy> {
    if config.randomize_user_agent {
        Arc::new(RandomAgent)
    } else {
        Arc::new(FixedAgent(config.user_agent.clone()))
    }
}

// --- Retry policy ---

/// Attempt limit and linear backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub step: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            base: config.backoff_base(),
            step: config.backoff_step(),
        }
    }

    /// Sleep after `failures` consecutive failures: `base + step * failures`.
    ///
    /// With the defaults (2s, 1.5s) this is `3 * (failures / 2) + 2` seconds.
    pub fn backoff(&self, failures: u32) -> Duration {
        self.base + self.step * failures
    }

    /// Delay before the next attempt, or `None` once the limit is reached.
    pub fn next_delay(&self, failures: u32) -> Option<Duration> {
        (failures < self.max_attempts).then(|| self.backoff(failures))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

// --- Transports ---

/// A single non-blocking GET. Connection-level failures must be reported as
/// [`AppError::Connection`] so the fetcher retries them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, user_agent: &str) -> Result<String>;
}

/// Blocking counterpart of [`Transport`].
pub trait BlockingTransport: Send + Sync {
    fn get(&self, url: &str, user_agent: &str) -> Result<String>;
}

/// Status and client-setup errors are final. Everything else failed on the
/// wire (refused, reset, dropped mid-response, timed out while sending or
/// while reading the body) and is a connection failure.
fn classify(url: &str, error: reqwest::Error) -> AppError {
    if error.is_status() || error.is_builder() || error.is_redirect() {
        AppError::Http(error)
    } else {
        AppError::connection(url, error)
    }
}

/// `reqwest` transport for the suspending fetcher.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| classify(url, e))?;
        response
            .error_for_status()?
            .text()
            .await
            .map_err(|e| classify(url, e))
    }
}

/// `reqwest` transport for the blocking fetcher.
#[derive(Debug, Clone)]
pub struct BlockingHttpTransport {
    client: reqwest::blocking::Client,
}

impl BlockingHttpTransport {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

impl BlockingTransport for BlockingHttpTransport {
    fn get(&self, url: &str, user_agent: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .map_err(|e| classify(url, e))?;
        response
            .error_for_status()?
            .text()
            .map_err(|e| classify(url, e))
    }
}

// --- Fetchers ---

/// Suspending fetcher: retries connection failures with backoff.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    headers: Arc<dyn HeaderStrategy>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        headers: Arc<dyn HeaderStrategy>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            headers,
            policy,
        }
    }

    /// Fetcher over a real HTTP client, configured from `[crawler]`.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(HttpTransport::new(config)?),
            header_strategy(config),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch the document body of `url`.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut failures = 0;
        loop {
            let agent = self.headers.user_agent();
            match self.transport.get(url, &agent).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    let delay = on_failure(&self.policy, url, failures, &e)?;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Blocking fetcher with the same retry behavior as [`Fetcher`].
#[derive(Clone)]
pub struct BlockingFetcher {
    transport: Arc<dyn BlockingTransport>,
    headers: Arc<dyn HeaderStrategy>,
    policy: RetryPolicy,
}

impl BlockingFetcher {
    pub fn new(
        transport: Arc<dyn BlockingTransport>,
        headers: Arc<dyn HeaderStrategy>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            headers,
            policy,
        }
    }

    /// Fetcher over a real blocking HTTP client, configured from `[crawler]`.
    ///
    /// Must not be created or dropped inside an async runtime.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(BlockingHttpTransport::new(config)?),
            header_strategy(config),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch the document body of `url`.
    pub fn fetch(&self, url: &str) -> Result<String> {
        let mut failures = 0;
        loop {
            let agent = self.headers.user_agent();
            match self.transport.get(url, &agent) {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    let delay = on_failure(&self.policy, url, failures, &e)?;
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Shared bookkeeping after a connection failure: the sleep before the next
/// attempt, or the exhausted-retries error.
fn on_failure(
    policy: &RetryPolicy,
    url: &str,
    failures: u32,
    error: &AppError,
) -> Result<Duration> {
    match policy.next_delay(failures) {
        Some(delay) => {
            log::warn!(
                "{} (attempt {}/{}), retrying in {:.1}s",
                error,
                failures,
                policy.max_attempts,
                delay.as_secs_f64()
            );
            Ok(delay)
        }
        None => {
            log::error!("Giving up on {} after {} attempts", url, failures);
            Err(AppError::Fetch {
                url: url.to_string(),
                attempts: failures,
            })
        }
    }
}
