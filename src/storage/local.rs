//! Local filesystem storage implementation.
//!
//! Every write goes to a temporary sibling file first and is then renamed
//! over the target, so a crash never leaves a half-written snapshot or
//! ledger behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Event, Ledger, LedgerEntry};
use crate::storage::{EventStore, LEDGER_FILE, SNAPSHOT_FILE, Snapshot};

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

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
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
        file.sync_all().await?;
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
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data, mapping undecodable content to `CacheCorrupt`.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::CacheCorrupt(format!("{key}: {e}"))),
            None => Ok(None),
        }
    }

    /// Read JSON data, treating any failure as absent.
    async fn read_json_lenient<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.read_json(key).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Ignoring {}: {}", key, e);
                None
            }
        }
    }
}

#[async_trait]
impl EventStore for LocalStorage {
    async fn save_snapshot(&self, events: &[Event], now: DateTime<Utc>) -> Result<()> {
        let snapshot = Snapshot::new(events.to_vec(), now);
        self.write_json(SNAPSHOT_FILE, &snapshot).await?;
        log::info!("Snapshot: {} events written to {}", events.len(), SNAPSHOT_FILE);
        Ok(())
    }

    async fn load_snapshot(&self) -> Option<Snapshot> {
        let snapshot = self.read_json_lenient::<Snapshot>(SNAPSHOT_FILE).await;
        if snapshot.is_none() {
            log::debug!("No usable {} found", SNAPSHOT_FILE);
        }
        snapshot
    }

    async fn load_ledger(&self) -> Result<Ledger> {
        match self.read_json::<Vec<LedgerEntry>>(LEDGER_FILE).await {
            Ok(entries) => Ok(entries.map(Ledger::from_entries).unwrap_or_default()),
            Err(e) => {
                log::error!("Refusing to use {}: {}", LEDGER_FILE, e);
                Err(e)
            }
        }
    }

    async fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        self.write_json(LEDGER_FILE, &ledger.to_entries()).await?;
        log::debug!("Ledger: {} entries written to {}", ledger.len(), LEDGER_FILE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use tempfile::TempDir;

    fn event(day: u32, venue: &str) -> Event {
        let d = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        Event::new(d, d, venue, "City").unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!storage.path("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.load_snapshot().await.is_none());
        assert!(storage.load_ledger().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_save_load() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        storage
            .save_snapshot(&[event(15, "A"), event(16, "B")], now)
            .await
            .unwrap();

        let loaded = storage.load_snapshot().await.unwrap();
        assert_eq!(loaded.captured_at, now);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.events[0].venue, "A");
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_cold_start() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage
            .write_bytes(SNAPSHOT_FILE, b"{ not json")
            .await
            .unwrap();

        assert!(storage.load_snapshot().await.is_none());
        assert!(matches!(
            storage.read_json::<Snapshot>(SNAPSHOT_FILE).await,
            Err(AppError::CacheCorrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_ledger_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let mut ledger = Ledger::new();
        ledger.record(&event(15, "A"), now);
        storage.save_ledger(&ledger).await.unwrap();
        assert_eq!(storage.load_ledger().await.unwrap(), ledger);

        storage.write_bytes(LEDGER_FILE, b"[{\"id\": \"tru").await.unwrap();
        assert!(matches!(
            storage.load_ledger().await,
            Err(AppError::CacheCorrupt(_))
        ));
        // The unreadable file is left in place
        assert_eq!(
            storage.read_bytes(LEDGER_FILE).await.unwrap(),
            Some(b"[{\"id\": \"tru".to_vec())
        );
    }

    #[tokio::test]
    async fn test_creates_missing_storage_dir() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nested/storage"));

        storage.save_snapshot(&[], Utc::now()).await.unwrap();
        assert!(storage.path(SNAPSHOT_FILE).exists());
    }
}
