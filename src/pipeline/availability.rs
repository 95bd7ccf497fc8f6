// src/pipeline/availability.rs

//! Seat availability runs.
//!
//! Both crawlers resolve free-form scope strings ("CPSC", "CPSC 110",
//! "CPSC 110 101") into a department -> course -> section -> seats tree.
//! [`AvailabilityCrawler`] drains the scopes through the worker pool;
//! [`SequentialCrawler`] walks them one blocking step at a time. For the same
//! site both produce the same tree.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{CatalogNode, Config, Identifier, SectionKey, Session};
use crate::pipeline::{AvailabilityTree, CrawlReport, JobFailure, JobHandler, WorkQueue, WorkerPool};
use crate::services::Expander;
use crate::utils::http::{BlockingFetcher, Fetcher};

/// Concurrent availability check over the worker pool.
pub struct AvailabilityCrawler {
    expander: Arc<Expander>,
    fetcher: Fetcher,
    pool: WorkerPool,
    session: Session,
}

impl AvailabilityCrawler {
    pub fn new(expander: Expander, fetcher: Fetcher, pool: WorkerPool, session: Session) -> Self {
        Self {
            expander: Arc::new(expander),
            fetcher,
            pool,
            session,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Expander::from_config(config)?,
            Fetcher::from_config(&config.crawler)?,
            WorkerPool::from_config(&config.crawler),
            config.session.session(),
        ))
    }

    /// Resolve `items` into seat counts.
    ///
    /// A malformed item fails the whole call before anything is fetched.
    pub async fn run<S: AsRef<str>>(&self, items: &[S]) -> Result<CrawlReport<AvailabilityTree>> {
        let started = Utc::now();
        let seeds = parse_items(&self.session, items)?;

        let handler = Arc::new(AvailabilityJobs {
            expander: Arc::clone(&self.expander),
            fetcher: self.fetcher.clone(),
            tree: AvailabilityTree::new(),
        });
        let failures = self.pool.run(Arc::clone(&handler), seeds).await?;

        let tree = Arc::try_unwrap(handler)
            .map_err(|_| AppError::validation("availability tree still shared after run"))?
            .tree;

        log_summary(&tree, &failures, (Utc::now() - started).num_seconds());
        Ok(CrawlReport::new(tree, failures))
    }
}

struct AvailabilityJobs {
    expander: Arc<Expander>,
    fetcher: Fetcher,
    tree: AvailabilityTree,
}

#[async_trait]
impl JobHandler for AvailabilityJobs {
    type Job = Identifier;

    async fn handle(&self, job: Identifier, queue: &WorkQueue<Identifier>) -> Result<()> {
        let node = self.expander.expand(&self.fetcher, &job).await?;
        for child in record(&self.tree, &job, node) {
            queue.push(child);
        }
        Ok(())
    }

    fn describe(&self, job: &Identifier) -> String {
        self.expander.urls().url_for(job)
    }
}

/// One-at-a-time availability check over the blocking fetcher.
///
/// Must run outside an async runtime (or inside `spawn_blocking`).
pub struct SequentialCrawler {
    expander: Expander,
    fetcher: BlockingFetcher,
    session: Session,
    fail_fast: bool,
}

impl SequentialCrawler {
    pub fn new(expander: Expander, fetcher: BlockingFetcher, session: Session) -> Self {
        Self {
            expander,
            fetcher,
            session,
            fail_fast: false,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Expander::from_config(config)?,
            BlockingFetcher::from_config(&config.crawler)?,
            config.session.session(),
        )
        .with_fail_fast(config.crawler.fail_fast))
    }

    /// Stop at the first failed scope instead of recording it.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Resolve `items` into seat counts, breadth first.
    pub fn run<S: AsRef<str>>(&self, items: &[S]) -> Result<CrawlReport<AvailabilityTree>> {
        let started = Utc::now();
        let mut seen = HashSet::new();
        let mut frontier = VecDeque::new();
        for id in parse_items(&self.session, items)? {
            if seen.insert(id.clone()) {
                frontier.push_back(id);
            }
        }

        let tree = AvailabilityTree::new();
        let mut failures = Vec::new();

        while let Some(job) = frontier.pop_front() {
            match self.expander.expand_blocking(&self.fetcher, &job) {
                Ok(node) => {
                    for child in record(&tree, &job, node) {
                        if seen.insert(child.clone()) {
                            frontier.push_back(child);
                        }
                    }
                }
                Err(error) => {
                    let url = self.expander.urls().url_for(&job);
                    log::warn!("Job {} failed: {}", url, error);
                    if self.fail_fast {
                        return Err(AppError::Aborted {
                            url,
                            source: Box::new(error),
                        });
                    }
                    failures.push(JobFailure { url, error });
                }
            }
        }

        log_summary(&tree, &failures, (Utc::now() - started).num_seconds());
        Ok(CrawlReport::new(tree, failures))
    }
}

fn parse_items<S: AsRef<str>>(session: &Session, items: &[S]) -> Result<Vec<Identifier>> {
    items
        .iter()
        .map(|item| Identifier::parse(session.clone(), item.as_ref()))
        .collect()
}

/// Store the outcome of expanding `job` and return the scopes below it.
///
/// A course with no sections this term still gets an (empty) node.
fn record(tree: &AvailabilityTree, job: &Identifier, node: CatalogNode) -> Vec<Identifier> {
    match node {
        CatalogNode::Seats(SectionKey { dept, course, section }, seats) => {
            tree.update(&dept, &course, |sections| {
                sections.insert(section, seats);
            });
            Vec::new()
        }
        CatalogNode::Children(tokens) => {
            if tokens.is_empty() {
                match (job.dept(), job.course()) {
                    (Some(dept), Some(course)) => tree.update(dept, course, |_| {}),
                    (Some(dept), None) => tree.touch_department(dept),
                    _ => {}
                }
            }
            tokens
                .iter()
                .filter_map(|token| job.child(token.as_str()))
                .collect()
        }
    }
}

fn log_summary(tree: &AvailabilityTree, failures: &[JobFailure], seconds: i64) {
    log::info!(
        "Availability check finished in {}s: {} courses, {} sections, {} failed jobs",
        seconds,
        tree.course_count(),
        tree.section_count(),
        failures.len()
    );
}
