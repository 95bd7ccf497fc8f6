//! In-memory transports and page builders for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, Identifier, Session};
use crate::utils::http::{
    BlockingFetcher, BlockingTransport, Fetcher, FixedAgent, RetryPolicy, Transport,
};
use crate::utils::url::UrlBuilder;

/// Canned response for one URL.
#[derive(Debug, Clone)]
pub enum StubPage {
    Body(String),
    /// Connection refused on every attempt
    Refused,
    /// Refused this many times, then serve the body
    FlakyThen(u32, String),
    /// Non-retryable failure
    Malformed,
}

/// Serves canned pages and records what was asked of it.
#[derive(Debug, Default)]
pub struct StubTransport {
    pages: HashMap<String, StubPage>,
    latency: Option<Duration>,
    calls: Mutex<HashMap<String, u32>>,
    agents: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, page: StubPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    pub fn with_body(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.with(url, StubPage::Body(body.into()))
    }

    /// Simulated network time per async request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn agents(&self) -> Vec<String> {
        self.agents.lock().unwrap().clone()
    }

    /// Highest number of async requests observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &str, user_agent: &str) -> Result<String> {
        self.agents.lock().unwrap().push(user_agent.to_string());
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        match self.pages.get(url) {
            Some(StubPage::Body(body)) => Ok(body.clone()),
            Some(StubPage::Refused) => Err(AppError::connection(url, "connection refused")),
            Some(StubPage::FlakyThen(failures, body)) => {
                if attempt <= *failures {
                    Err(AppError::connection(url, "connection reset"))
                } else {
                    Ok(body.clone())
                }
            }
            Some(StubPage::Malformed) => Err(AppError::validation("malformed response")),
            None => Err(AppError::validation(format!("no stub page for {url}"))),
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.respond(url, user_agent);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl BlockingTransport for StubTransport {
    fn get(&self, url: &str, user_agent: &str) -> Result<String> {
        self.respond(url, user_agent)
    }
}

/// Index page listing the given hrefs.
pub fn index_page(hrefs: &[String]) -> String {
    let anchors: String = hrefs
        .iter()
        .map(|href| {
            let href = href.replace('&', "&amp;");
            format!("<tr><td><a href=\"{href}\">link</a></td></tr>\n")
        })
        .collect();
    format!(
        "<html><body><a href=\"/cs/main?pname=welcome\">Home</a>\
         <table>{anchors}</table></body></html>"
    )
}

/// Section detail page carrying the given seat counts.
pub fn section_page(counts: &[u32]) -> String {
    let rows: String = counts
        .iter()
        .zip(crate::models::SEAT_LABELS)
        .map(|(n, label)| format!("<tr><td>{label}:</td><td><strong>{n}</strong></td></tr>"))
        .collect();
    format!(
        "<html><body><h4><strong>Section detail</strong></h4>\
         <table>{rows}</table></body></html>"
    )
}

/// Page shown for a course or department that is not offered.
pub fn not_offered_page() -> String {
    "<html><body><div class=\"alert\">The requested course is either no longer offered \
     at this campus or is not offered this session.</div></body></html>"
        .to_string()
}

pub fn test_session() -> Session {
    Session::new("W", "2024", "UBC")
}

/// Builder for the default endpoint.
pub fn urls() -> UrlBuilder {
    UrlBuilder::new(&CrawlerConfig::default().base_url).unwrap()
}

/// Request URL of a scope string like `"CPSC 110"`; empty for the catalog root.
pub fn url_of(scope: &str) -> String {
    let id = if scope.trim().is_empty() {
        Identifier::catalog(test_session())
    } else {
        Identifier::parse(test_session(), scope).unwrap()
    };
    urls().url_for(&id)
}

/// Index page for `scope` linking to each child token.
pub fn children_page(scope: &str, tokens: &[&str]) -> String {
    let parent = if scope.trim().is_empty() {
        Identifier::catalog(test_session())
    } else {
        Identifier::parse(test_session(), scope).unwrap()
    };
    let hrefs: Vec<String> = tokens
        .iter()
        .map(|t| urls().url_for(&parent.child(*t).unwrap()))
        .collect();
    index_page(&hrefs)
}

/// A small course-schedule site:
///
/// ```text
/// CPSC  110  101 (5/95/3/2), 102 (5/95/3/2)
///       121  not offered
/// MATH  100  101 (0/120/0/0)
/// PHIL  999  not offered
/// ```
pub fn sample_site() -> StubTransport {
    StubTransport::new()
        .with_body(url_of(""), children_page("", &["CPSC", "MATH", "PHIL"]))
        .with_body(url_of("CPSC"), children_page("CPSC", &["110", "121"]))
        .with_body(url_of("CPSC 110"), children_page("CPSC 110", &["101", "102"]))
        .with_body(url_of("CPSC 110 101"), section_page(&[5, 95, 3, 2]))
        .with_body(url_of("CPSC 110 102"), section_page(&[5, 95, 3, 2]))
        .with_body(url_of("CPSC 121"), not_offered_page())
        .with_body(url_of("MATH"), children_page("MATH", &["100"]))
        .with_body(url_of("MATH 100"), children_page("MATH 100", &["101"]))
        .with_body(url_of("MATH 100 101"), section_page(&[0, 120, 0, 0]))
        .with_body(url_of("PHIL"), children_page("PHIL", &["999"]))
        .with_body(url_of("PHIL 999"), not_offered_page())
}

fn quick_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base: Duration::ZERO,
        step: Duration::ZERO,
    }
}

/// Async fetcher over `stub` with no backoff.
pub fn quick_fetcher(stub: Arc<StubTransport>, max_attempts: u32) -> Fetcher {
    Fetcher::new(stub, Arc::new(FixedAgent("test".into())), quick_policy(max_attempts))
}

/// Blocking fetcher over `stub` with no backoff.
pub fn quick_blocking_fetcher(stub: Arc<StubTransport>, max_attempts: u32) -> BlockingFetcher {
    BlockingFetcher::new(stub, Arc::new(FixedAgent("test".into())), quick_policy(max_attempts))
}
