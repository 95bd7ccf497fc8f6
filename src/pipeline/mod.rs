//! Pipeline entry points for crawler operations.
//!
//! - `CatalogCrawler`: Discover every course and section of a set of departments
//! - `AvailabilityCrawler`: Check seats through the worker pool
//! - `SequentialCrawler`: Check seats one blocking step at a time

pub mod availability;
pub mod catalog;
pub mod pool;
pub mod queue;
pub mod tree;

pub use availability::{AvailabilityCrawler, SequentialCrawler};
pub use catalog::CatalogCrawler;
pub use pool::{CrawlReport, JobFailure, JobHandler, WorkerPool};
pub use queue::WorkQueue;
pub use tree::{Availability, AvailabilityTree, CatalogTree, ResultTree, Sections};
