// src/pipeline/pool.rs

//! Fixed-size worker pool draining a [`WorkQueue`].
//!
//! Workers share one concurrency gate. A job may push child jobs before it is
//! acknowledged, so the run ends only when every job, seeded or discovered,
//! has been handled.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::pipeline::WorkQueue;

/// Work executed by pool workers.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Job: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static;

    /// Execute one job, pushing any child jobs onto `queue`.
    async fn handle(&self, job: Self::Job, queue: &WorkQueue<Self::Job>) -> Result<()>;

    /// Label recorded when the job fails; usually its request URL.
    fn describe(&self, job: &Self::Job) -> String {
        job.to_string()
    }
}

/// A job that failed during a run.
#[derive(Debug)]
pub struct JobFailure {
    pub url: String,
    pub error: AppError,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.error)
    }
}

/// Outcome of a run whose failed jobs were isolated.
#[derive(Debug)]
pub struct CrawlReport<T> {
    pub tree: T,
    pub failures: Vec<JobFailure>,
}

impl<T> CrawlReport<T> {
    pub fn new(tree: T, failures: Vec<JobFailure>) -> Self {
        Self { tree, failures }
    }

    /// Whether every job succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The tree if every job succeeded, otherwise the first failure's error.
    pub fn into_result(self) -> Result<T> {
        match self.into_parts() {
            (tree, Ok(())) => Ok(tree),
            (_, Err(e)) => Err(e),
        }
    }

    /// The tree, partial or not, and the first failure's error if any job
    /// failed.
    pub fn into_parts(self) -> (T, Result<()>) {
        let outcome = match self.failures.into_iter().next() {
            None => Ok(()),
            Some(failure) => Err(failure.error),
        };
        (self.tree, outcome)
    }
}

/// Pool of workers with a shared concurrency limit.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    max_concurrent: usize,
    fail_fast: bool,
}

impl WorkerPool {
    pub fn new(workers: usize, max_concurrent: usize) -> Self {
        Self {
            workers: workers.max(1),
            max_concurrent: max_concurrent.max(1),
            fail_fast: false,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.workers, config.max_concurrent).with_fail_fast(config.fail_fast)
    }

    /// Abort the whole run on the first job failure.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Run `handler` over `seeds` and every job they discover.
    ///
    /// Failed jobs are logged, recorded and acknowledged so the run still
    /// drains. With fail-fast enabled the first failure aborts the queue and
    /// the run returns [`AppError::Aborted`].
    pub async fn run<H: JobHandler>(
        &self,
        handler: Arc<H>,
        seeds: impl IntoIterator<Item = H::Job>,
    ) -> Result<Vec<JobFailure>> {
        let queue = Arc::new(WorkQueue::new());
        for seed in seeds {
            queue.push(seed);
        }
        queue.close_if_idle();

        let gate = Arc::new(Semaphore::new(self.max_concurrent));
        let failures = Arc::new(Mutex::new(Vec::new()));

        log::debug!(
            "Starting {} workers for {} seed jobs (max {} concurrent)",
            self.workers,
            queue.pending(),
            self.max_concurrent
        );

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(worker(
                id,
                Arc::clone(&handler),
                Arc::clone(&queue),
                Arc::clone(&gate),
                Arc::clone(&failures),
                self.fail_fast,
            ));
        }

        let mut panicked = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                log::error!("Worker terminated abnormally: {}", e);
                // its job was never acknowledged; release the others
                queue.abort();
                panicked.get_or_insert(e);
            }
        }
        if let Some(e) = panicked {
            return Err(AppError::worker(e));
        }

        let failures = std::mem::take(&mut *lock(&failures));
        if self.fail_fast {
            if let Some(first) = failures.into_iter().next() {
                return Err(AppError::Aborted {
                    url: first.url,
                    source: Box::new(first.error),
                });
            }
            return Ok(Vec::new());
        }
        Ok(failures)
    }
}

async fn worker<H: JobHandler>(
    id: usize,
    handler: Arc<H>,
    queue: Arc<WorkQueue<H::Job>>,
    gate: Arc<Semaphore>,
    failures: Arc<Mutex<Vec<JobFailure>>>,
    fail_fast: bool,
) {
    log::debug!("Worker {} started", id);

    while let Some(job) = queue.pop().await {
        let outcome = match gate.acquire().await {
            Ok(_permit) => handler.handle(job.clone(), &queue).await,
            Err(_) => break,
        };

        if let Err(error) = outcome {
            let url = handler.describe(&job);
            log::warn!("Job {} failed: {}", url, error);
            lock(&failures).push(JobFailure { url, error });
            if fail_fast {
                queue.abort();
                break;
            }
        }
        queue.ack();
    }

    log::debug!("Worker {} exiting", id);
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
