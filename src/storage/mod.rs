//! Storage abstractions for crawl results.
//!
//! The stored catalog is the read-only course tree that selection UIs use;
//! it is produced by a full catalog run and not regenerated per request. The
//! availability report holds the seats of the most recent check.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml          # Crawler configuration
//! ├── catalog.json         # Department -> course -> [section]
//! └── availability.json    # Department -> course -> section -> seats
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Catalog, Session};
use crate::pipeline::Availability;

// Re-export for convenience
pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Where the document was written
    pub location: String,
    /// Number of leaf entries written
    pub entries: usize,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// Stored document with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// ISO 8601 timestamp of the write
    pub updated_at: DateTime<Utc>,
    /// Session the data was crawled for
    pub session: Session,
    /// Number of leaf entries (sections)
    pub count: usize,
    pub data: T,
}

impl<T> Snapshot<T> {
    pub fn new(session: Session, count: usize, data: T) -> Self {
        Self {
            updated_at: Utc::now(),
            session,
            count,
            data,
        }
    }
}

/// Trait for result storage backends.
#[async_trait]
pub trait CatalogStorage: Send + Sync {
    /// Replace the stored catalog.
    async fn save_catalog(&self, session: &Session, catalog: &Catalog) -> Result<WriteMetadata>;

    /// Load the stored catalog, if one was saved.
    async fn load_catalog(&self) -> Result<Option<Snapshot<Catalog>>>;

    /// Replace the stored availability report.
    async fn save_availability(
        &self,
        session: &Session,
        availability: &Availability,
    ) -> Result<WriteMetadata>;

    /// Load the last availability report, if one was saved.
    async fn load_availability(&self) -> Result<Option<Snapshot<Availability>>>;
}
