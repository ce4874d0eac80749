//! Column engine adapter
//!
//! Stores typed rows in an ordered map. The engine has no aggregation
//! support, so `count_by_owner` is a full scan with a local tally; it
//! must agree with the document engine's aggregation for identical data.

use crate::error::StoreError;
use crate::record::{sort_records, Record, SortKey};
use crate::store::{BatchOutcome, RecordStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Row-oriented engine.
#[derive(Debug)]
pub struct ColumnStore {
    name: String,
    rows: RwLock<BTreeMap<u64, Record>>,
    connected: AtomicBool,
    snapshot: Option<PathBuf>,
}

impl ColumnStore {
    /// Create an engine with no durable snapshot.
    #[must_use]
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(BTreeMap::new()),
            connected: AtomicBool::new(true),
            snapshot: None,
        }
    }

    /// Open an engine backed by a JSON snapshot file, loading any
    /// existing contents.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut store = Self::in_memory(name);
        store.snapshot = Some(path.as_ref().to_path_buf());
        store.load()?;
        Ok(store)
    }

    /// Simulate driver connectivity. A disconnected engine fails every
    /// operation with `Unavailable`.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                store: self.name.clone(),
            })
        }
    }

    fn load(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| self.snapshot_err(e))?;
        let records: Vec<Record> = serde_json::from_str(&raw).map_err(|e| self.snapshot_err(e))?;
        let mut rows = self.rows.write();
        for record in records {
            rows.insert(record.id, record);
        }
        Ok(())
    }

    /// Serialize the current rows while holding the read lock, then write
    /// tmp-file + rename so a crash never leaves a torn snapshot.
    fn flush(&self, rows: &BTreeMap<u64, Record>) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let records: Vec<&Record> = rows.values().collect();
        let raw = serde_json::to_string_pretty(&records).map_err(|e| self.snapshot_err(e))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| self.snapshot_err(e))?;
        std::fs::rename(&tmp, path).map_err(|e| self.snapshot_err(e))?;
        Ok(())
    }

    fn snapshot_err(&self, err: impl std::fmt::Display) -> StoreError {
        StoreError::Snapshot {
            store: self.name.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for ColumnStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_all(&self, sort: SortKey) -> Result<Vec<Record>, StoreError> {
        self.ensure_connected()?;
        let mut records: Vec<Record> = self.rows.read().values().cloned().collect();
        sort_records(&mut records, sort);
        Ok(records)
    }

    async fn insert(&self, record: Record) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let id = record.id;
        let mut rows = self.rows.write();
        if rows.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                store: self.name.clone(),
                id,
            });
        }
        rows.insert(id, record);
        // A failed snapshot write must not leave a record visible that
        // was never reported as inserted.
        if let Err(err) = self.flush(&rows) {
            rows.remove(&id);
            return Err(err);
        }
        Ok(())
    }

    async fn insert_batch(&self, records: Vec<Record>) -> Result<BatchOutcome, StoreError> {
        self.ensure_connected()?;
        let mut outcome = BatchOutcome::default();
        let mut inserted_ids = Vec::new();
        let mut rows = self.rows.write();
        for record in records {
            if rows.contains_key(&record.id) {
                outcome.already_present += 1;
            } else {
                inserted_ids.push(record.id);
                rows.insert(record.id, record);
                outcome.inserted += 1;
            }
        }
        if let Err(err) = self.flush(&rows) {
            for id in inserted_ids {
                rows.remove(&id);
            }
            return Err(err);
        }
        Ok(outcome)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.ensure_connected()?;
        Ok(self.rows.read().len() as u64)
    }

    async fn count_by_owner(&self) -> Result<HashMap<String, u64>, StoreError> {
        self.ensure_connected()?;
        // No engine aggregation here: scan every row and tally locally.
        let mut counts: HashMap<String, u64> = HashMap::new();
        for record in self.rows.read().values() {
            *counts.entry(record.owner.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn max_id(&self) -> Result<Option<u64>, StoreError> {
        self.ensure_connected()?;
        Ok(self.rows.read().keys().next_back().copied())
    }

    async fn purge(&self) -> Result<u64, StoreError> {
        self.ensure_connected()?;
        let mut rows = self.rows.write();
        let removed = rows.len() as u64;
        rows.clear();
        self.flush(&rows)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: u64, title: &str, owner: &str, secs: i64) -> Record {
        Record::new(
            id,
            title,
            "content",
            owner,
            Utc.timestamp_opt(secs, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn max_id_tracks_highest_key() {
        let store = ColumnStore::in_memory("target");
        assert_eq!(store.max_id().await.unwrap(), None);
        store.insert(record(3, "c", "ada", 3)).await.unwrap();
        store.insert(record(1, "a", "ada", 1)).await.unwrap();
        assert_eq!(store.max_id().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn batch_insert_tolerates_duplicates() {
        let store = ColumnStore::in_memory("target");
        store.insert(record(1, "seeded", "ada", 1)).await.unwrap();

        let outcome = store
            .insert_batch(vec![
                record(1, "seeded", "ada", 1),
                record(2, "fresh", "bob", 2),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.already_present, 1);
        assert!(outcome.failed.is_empty());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn owner_tally_counts_every_row() {
        let store = ColumnStore::in_memory("target");
        store.insert(record(1, "a", "ada", 1)).await.unwrap();
        store.insert(record(2, "b", "bob", 2)).await.unwrap();
        store.insert(record(3, "c", "ada", 3)).await.unwrap();

        let counts = store.count_by_owner().await.unwrap();
        assert_eq!(counts.get("ada"), Some(&2));
        assert_eq!(counts.get("bob"), Some(&1));
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.json");

        let store = ColumnStore::open("target", &path).unwrap();
        store.insert(record(1, "kept", "ada", 10)).await.unwrap();
        drop(store);

        let reopened = ColumnStore::open("target", &path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert_eq!(reopened.max_id().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn failed_snapshot_flush_rolls_back_the_insert() {
        let dir = tempfile::tempdir().unwrap();
        // The parent directory never exists, so every flush fails.
        let path = dir.path().join("missing/target.json");
        let store = ColumnStore::open("target", &path).unwrap();

        let err = store.insert(record(1, "a", "ada", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Snapshot { .. }));
        assert_eq!(store.count().await.unwrap(), 0);

        let err = store
            .insert_batch(vec![record(1, "a", "ada", 1), record(2, "b", "bob", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Snapshot { .. }));
        assert_eq!(store.max_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn disconnected_engine_is_unavailable() {
        let store = ColumnStore::in_memory("target");
        store.set_connected(false);
        let err = store.insert(record(1, "a", "ada", 1)).await.unwrap_err();
        assert!(err.is_transient());
    }
}
