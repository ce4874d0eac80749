//! Document engine adapter
//!
//! Stores records as loosely-typed JSON documents keyed by id, the way
//! the legacy store holds them. Aggregation (`count_by_owner`) runs
//! engine-side over the raw documents. Decoding tolerates the legacy
//! textual timestamp format; an unreadable timestamp falls back to "now",
//! which is lossy and logged at warn.

use crate::error::StoreError;
use crate::record::{sort_records, Record, SortKey};
use crate::store::{BatchOutcome, RecordStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Legacy textual timestamp layout still present in old documents.
const LEGACY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// JSON-document engine.
#[derive(Debug)]
pub struct DocumentStore {
    name: String,
    docs: DashMap<u64, Value>,
    connected: AtomicBool,
    snapshot: Option<PathBuf>,
    flush_gate: Mutex<()>,
}

impl DocumentStore {
    /// Create an engine with no durable snapshot.
    #[must_use]
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: DashMap::new(),
            connected: AtomicBool::new(true),
            snapshot: None,
            flush_gate: Mutex::new(()),
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
        let docs: Vec<Value> = serde_json::from_str(&raw).map_err(|e| self.snapshot_err(e))?;
        for doc in docs {
            match doc.get("id").and_then(Value::as_u64) {
                Some(id) => {
                    self.docs.insert(id, doc);
                }
                None => {
                    tracing::warn!(store = %self.name, "skipping snapshot document without id");
                }
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let _guard = self.flush_gate.lock();
        let mut docs: Vec<(u64, Value)> = self
            .docs
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        docs.sort_by_key(|(id, _)| *id);
        let docs: Vec<Value> = docs.into_iter().map(|(_, doc)| doc).collect();
        let raw = serde_json::to_string_pretty(&docs).map_err(|e| self.snapshot_err(e))?;
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

    fn decode(&self, id: u64, doc: &Value) -> Record {
        let title = doc.get("title").and_then(Value::as_str).unwrap_or_default();
        let content = doc
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let owner = doc.get("owner").and_then(Value::as_str).unwrap_or_default();
        let created_at = self.decode_created_at(id, doc);
        Record::new(id, title, content, owner, created_at)
    }

    fn decode_created_at(&self, id: u64, doc: &Value) -> DateTime<Utc> {
        let raw = doc.get("createdAt").and_then(Value::as_str);
        if let Some(text) = raw {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return parsed.with_timezone(&Utc);
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, LEGACY_DATE_FORMAT) {
                return naive.and_utc();
            }
        }
        // Lossy fallback: an absent or unparseable timestamp becomes the
        // read time and the original value is unrecoverable.
        tracing::warn!(
            store = %self.name,
            record_id = id,
            raw = ?raw,
            "unreadable createdAt, substituting current time"
        );
        Utc::now()
    }
}

#[async_trait]
impl RecordStore for DocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_all(&self, sort: SortKey) -> Result<Vec<Record>, StoreError> {
        self.ensure_connected()?;
        let mut records: Vec<Record> = self
            .docs
            .iter()
            .map(|entry| self.decode(*entry.key(), entry.value()))
            .collect();
        sort_records(&mut records, sort);
        Ok(records)
    }

    async fn insert(&self, record: Record) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let id = record.id;
        let doc = serde_json::to_value(&record).map_err(|e| self.snapshot_err(e))?;
        match self.docs.entry(id) {
            Entry::Occupied(_) => {
                return Err(StoreError::DuplicateKey {
                    store: self.name.clone(),
                    id,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(doc);
            }
        }
        // A failed snapshot write must not leave a record visible that
        // was never reported as inserted.
        if let Err(err) = self.flush() {
            self.docs.remove(&id);
            return Err(err);
        }
        Ok(())
    }

    async fn insert_batch(&self, records: Vec<Record>) -> Result<BatchOutcome, StoreError> {
        self.ensure_connected()?;
        let mut outcome = BatchOutcome::default();
        let mut inserted_ids = Vec::new();
        for record in records {
            let id = record.id;
            let doc = match serde_json::to_value(&record) {
                Ok(doc) => doc,
                Err(err) => {
                    outcome.failed.push((id, err.to_string()));
                    continue;
                }
            };
            match self.docs.entry(id) {
                Entry::Occupied(_) => outcome.already_present += 1,
                Entry::Vacant(slot) => {
                    slot.insert(doc);
                    inserted_ids.push(id);
                    outcome.inserted += 1;
                }
            }
        }
        // One snapshot write per batch, not per record. On failure the
        // whole batch is rolled back so the error report stays truthful.
        if let Err(err) = self.flush() {
            for id in inserted_ids {
                self.docs.remove(&id);
            }
            return Err(err);
        }
        Ok(outcome)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.ensure_connected()?;
        Ok(self.docs.len() as u64)
    }

    async fn count_by_owner(&self) -> Result<HashMap<String, u64>, StoreError> {
        self.ensure_connected()?;
        // Engine-side aggregation over the raw documents.
        let mut counts: HashMap<String, u64> = HashMap::new();
        for entry in self.docs.iter() {
            let owner = entry
                .value()
                .get("owner")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            *counts.entry(owner).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn max_id(&self) -> Result<Option<u64>, StoreError> {
        self.ensure_connected()?;
        Ok(self.docs.iter().map(|entry| *entry.key()).max())
    }

    async fn purge(&self) -> Result<u64, StoreError> {
        self.ensure_connected()?;
        let removed = self.docs.len() as u64;
        self.docs.clear();
        self.flush()?;
        Ok(removed)
    }
}
