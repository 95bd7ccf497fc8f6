//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── catalog.json         # Stored course tree
//! └── availability.json    # Last availability report
//! ```
//!
//! Every write goes to a temporary file first and is renamed into place, so
//! readers never see a half-written document.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Catalog, Session};
use crate::pipeline::Availability;
use crate::storage::{CatalogStorage, Snapshot, WriteMetadata};

const CATALOG_KEY: &str = "catalog.json";
const AVAILABILITY_KEY: &str = "availability.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.path(CATALOG_KEY)
    }

    pub fn availability_path(&self) -> PathBuf {
        self.path(AVAILABILITY_KEY)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_snapshot<T: Serialize + Sync>(
        &self,
        key: &str,
        session: &Session,
        count: usize,
        data: &T,
    ) -> Result<WriteMetadata> {
        let snapshot = Snapshot::new(session.clone(), count, data);
        self.write_json(key, &snapshot).await?;

        let location = self.path(key).display().to_string();
        log::info!("{} entries written to {}", count, location);
        Ok(WriteMetadata {
            location,
            entries: count,
            timestamp: snapshot.updated_at,
        })
    }
}

#[async_trait]
impl CatalogStorage for LocalStorage {
    async fn save_catalog(&self, session: &Session, catalog: &Catalog) -> Result<WriteMetadata> {
        let count = catalog
            .values()
            .flat_map(|courses| courses.values())
            .map(Vec::len)
            .sum();
        self.write_snapshot(CATALOG_KEY, session, count, catalog)
            .await
    }

    async fn load_catalog(&self) -> Result<Option<Snapshot<Catalog>>> {
        self.read_json(CATALOG_KEY).await
    }

    async fn save_availability(
        &self,
        session: &Session,
        availability: &Availability,
    ) -> Result<WriteMetadata> {
        let count = availability
            .values()
            .flat_map(|courses| courses.values())
            .map(|sections| sections.len())
            .sum();
        self.write_snapshot(AVAILABILITY_KEY, session, count, availability)
            .await
    }

    async fn load_availability(&self) -> Result<Option<Snapshot<Availability>>> {
        self.read_json(AVAILABILITY_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::SeatSnapshot;
    use tempfile::TempDir;

    fn session() -> Session {
        Session::new("W", "2024", "UBC")
    }

    fn catalog() -> Catalog {
        let mut cpsc = BTreeMap::new();
        cpsc.insert("110".to_string(), vec!["101".to_string(), "L1A".to_string()]);
        cpsc.insert("121".to_string(), Vec::new());
        let mut catalog = Catalog::new();
        catalog.insert("CPSC".to_string(), cpsc);
        catalog.insert("PHIL".to_string(), BTreeMap::new());
        catalog
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.load_catalog().await.unwrap().is_none());
        assert!(storage.load_availability().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_catalog_save_load() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nested"));

        let meta = storage.save_catalog(&session(), &catalog()).await.unwrap();
        assert_eq!(meta.entries, 2);
        assert!(storage.catalog_path().exists());

        let loaded = storage.load_catalog().await.unwrap().unwrap();
        assert_eq!(loaded.data, catalog());
        assert_eq!(loaded.session, session());
        assert_eq!(loaded.count, 2);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_catalog() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.save_catalog(&session(), &catalog()).await.unwrap();
        storage.save_catalog(&session(), &Catalog::new()).await.unwrap();

        let loaded = storage.load_catalog().await.unwrap().unwrap();
        assert!(loaded.data.is_empty());
    }

    #[tokio::test]
    async fn test_availability_uses_seat_labels() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut sections = BTreeMap::new();
        sections.insert("101".to_string(), SeatSnapshot::from_counts([5, 95, 3, 2]));
        let mut courses = BTreeMap::new();
        courses.insert("110".to_string(), sections);
        let mut availability = Availability::new();
        availability.insert("CPSC".to_string(), courses);

        let meta = storage
            .save_availability(&session(), &availability)
            .await
            .unwrap();
        assert_eq!(meta.entries, 1);

        let raw = std::fs::read_to_string(storage.availability_path()).unwrap();
        assert!(raw.contains("\"General Seats Remaining\": 3"));

        let loaded = storage.load_availability().await.unwrap().unwrap();
        assert_eq!(loaded.data, availability);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        std::fs::write(storage.catalog_path(), "{ not json").unwrap();

        let err = storage.load_catalog().await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
    }
}
