// src/pipeline/catalog.rs

//! Whole-catalog discovery.
//!
//! Builds the department -> course -> [section tokens] tree that selection
//! UIs read. Department jobs write their course list before enqueuing course
//! jobs, so a course job always finds its department node in place.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Config, Identifier, Scope, Session};
use crate::pipeline::{CatalogTree, CrawlReport, JobHandler, WorkQueue, WorkerPool};
use crate::services::Expander;
use crate::utils::http::Fetcher;

/// Discovers every course and section of the given departments.
pub struct CatalogCrawler {
    expander: Arc<Expander>,
    fetcher: Fetcher,
    pool: WorkerPool,
    session: Session,
}

impl CatalogCrawler {
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

    /// Department tokens from the all-departments listing.
    pub async fn list_departments(&self) -> Result<Vec<String>> {
        self.expander
            .list_departments(&self.fetcher, &self.session)
            .await
    }

    /// Crawl `departments`, or every listed department when none are given.
    pub async fn run(&self, departments: &[String]) -> Result<CrawlReport<CatalogTree>> {
        let started = Utc::now();
        let departments = if departments.is_empty() {
            self.list_departments().await?
        } else {
            departments.to_vec()
        };

        let handler = Arc::new(CatalogJobs {
            expander: Arc::clone(&self.expander),
            fetcher: self.fetcher.clone(),
            tree: CatalogTree::new(),
        });
        let seeds = departments
            .iter()
            .map(|dept| Identifier::department(self.session.clone(), dept.as_str()));
        let failures = self.pool.run(Arc::clone(&handler), seeds).await?;

        let tree = Arc::try_unwrap(handler)
            .map_err(|_| AppError::validation("catalog tree still shared after run"))?
            .tree;

        log::info!(
            "Catalog crawl finished in {}s: {} departments, {} courses, {} failed jobs",
            (Utc::now() - started).num_seconds(),
            tree.department_count(),
            tree.course_count(),
            failures.len()
        );
        Ok(CrawlReport::new(tree, failures))
    }
}

struct CatalogJobs {
    expander: Arc<Expander>,
    fetcher: Fetcher,
    tree: CatalogTree,
}

#[async_trait]
impl JobHandler for CatalogJobs {
    type Job = Identifier;

    async fn handle(&self, job: Identifier, queue: &WorkQueue<Identifier>) -> Result<()> {
        let node = self.expander.expand(&self.fetcher, &job).await?;
        let children = node.children();

        match (job.scope(), job.dept(), job.course()) {
            (Scope::Department, Some(dept), _) => {
                self.tree.merge_department(
                    dept,
                    children.iter().map(|course| (course.clone(), Vec::new())),
                );
            }
            (Scope::Course, Some(dept), Some(course)) => {
                self.tree.merge(dept, course, children.to_vec());
                return Ok(());
            }
            _ => {}
        }

        for token in children {
            if let Some(child) = job.child(token.as_str()) {
                queue.push(child);
            }
        }
        Ok(())
    }

    fn describe(&self, job: &Identifier) -> String {
        self.expander.urls().url_for(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::utils::stub::{StubPage, StubTransport, quick_fetcher, sample_site, test_session, url_of};

    fn crawler(stub: Arc<StubTransport>, pool: WorkerPool) -> CatalogCrawler {
        CatalogCrawler::new(
            Expander::from_config(&Config::default()).unwrap(),
            quick_fetcher(stub, 3),
            pool,
            test_session(),
        )
    }

    #[tokio::test]
    async fn test_catalog_of_given_departments() {
        let stub = Arc::new(sample_site());
        let report = crawler(stub.clone(), WorkerPool::new(4, 4))
            .run(&["CPSC".to_string(), "PHIL".to_string()])
            .await
            .unwrap();

        assert!(report.is_complete());
        let catalog = report.into_result().unwrap().into_map();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog["CPSC"]["110"], vec!["101", "102"]);
        assert!(catalog["CPSC"]["121"].is_empty());
        assert!(catalog["PHIL"]["999"].is_empty());

        // section pages are never fetched for the catalog
        assert_eq!(stub.calls(&url_of("CPSC 110 101")), 0);
        assert_eq!(stub.calls(&url_of("")), 0);
    }

    #[tokio::test]
    async fn test_catalog_lists_departments_when_none_given() {
        let stub = Arc::new(sample_site());
        let report = crawler(stub.clone(), WorkerPool::new(2, 2))
            .run(&[])
            .await
            .unwrap();

        let catalog = report.into_result().unwrap().into_map();
        assert_eq!(
            catalog.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["CPSC", "MATH", "PHIL"]
        );
        assert_eq!(catalog["MATH"]["100"], vec!["101"]);
        assert_eq!(stub.calls(&url_of("")), 1);
    }

    #[tokio::test]
    async fn test_rejected_department_listing_is_an_error() {
        let stub = Arc::new(
            StubTransport::new().with_body(url_of(""), "<html><body>Blocked</body></html>"),
        );
        let err = crawler(stub, WorkerPool::new(2, 2)).run(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::UnexpectedPage { .. }));
    }

    #[tokio::test]
    async fn test_failed_department_is_reported_not_dropped() {
        let stub = Arc::new(sample_site().with(url_of("MATH"), StubPage::Refused));
        let report = crawler(stub.clone(), WorkerPool::new(3, 3))
            .run(&["CPSC".to_string(), "MATH".to_string()])
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].url, url_of("MATH"));
        assert!(matches!(
            report.failures[0].error,
            AppError::Fetch { attempts: 3, .. }
        ));
        assert_eq!(stub.calls(&url_of("MATH")), 3);
        assert_eq!(report.tree.department_count(), 1);
        assert!(matches!(report.into_result(), Err(AppError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_catalog_run() {
        let stub = Arc::new(sample_site().with(url_of("CPSC"), StubPage::Malformed));
        let err = crawler(stub, WorkerPool::new(1, 1).with_fail_fast(true))
            .run(&["CPSC".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Aborted { .. }));
    }
}
