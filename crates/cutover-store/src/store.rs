//! The uniform adapter trait both engines implement
//!
//! The router, migrator, and reconciler all consume this surface; nothing
//! above it knows which engine is behind a handle.

use crate::error::StoreError;
use crate::record::{Record, SortKey};
use async_trait::async_trait;
use std::collections::HashMap;

/// Per-record results of a bulk insert.
///
/// `DuplicateKey` counts as `already_present` rather than a failure so a
/// migration retry over partially-copied data is idempotent.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Records newly persisted
    pub inserted: u64,
    /// Records skipped because the id already existed
    pub already_present: u64,
    /// Records that could not be persisted: (id, reason)
    pub failed: Vec<(u64, String)>,
}

impl BatchOutcome {
    /// Fold another outcome into this one.
    pub fn absorb(&mut self, other: BatchOutcome) {
        self.inserted += other.inserted;
        self.already_present += other.already_present;
        self.failed.extend(other.failed);
    }
}

/// Uniform operations over one backing store.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Adapter name, used in errors, logs, and status reports.
    fn name(&self) -> &str;

    /// All live records in the requested order.
    async fn list_all(&self, sort: SortKey) -> Result<Vec<Record>, StoreError>;

    /// Persist a fully-populated record (caller supplies `id` and
    /// `created_at`).
    async fn insert(&self, record: Record) -> Result<(), StoreError>;

    /// Bulk insert for migration batches. Never fails the whole batch on
    /// a per-record problem; each record lands in exactly one bucket of
    /// the outcome.
    async fn insert_batch(&self, records: Vec<Record>) -> Result<BatchOutcome, StoreError> {
        let mut outcome = BatchOutcome::default();
        for record in records {
            let id = record.id;
            match self.insert(record).await {
                Ok(()) => outcome.inserted += 1,
                Err(err) if err.is_duplicate() => outcome.already_present += 1,
                Err(err) => outcome.failed.push((id, err.to_string())),
            }
        }
        Ok(outcome)
    }

    /// Total live record count.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Record count per owner. Engine-side aggregation where the engine
    /// supports it, full scan and local tally otherwise; both must agree
    /// for identical data.
    async fn count_by_owner(&self) -> Result<HashMap<String, u64>, StoreError>;

    /// Highest assigned id, or `None` if the store is empty.
    async fn max_id(&self) -> Result<Option<u64>, StoreError>;

    /// Administrative deletion of every record. Only the operator
    /// `cleanup` path calls this; live traffic never deletes.
    async fn purge(&self) -> Result<u64, StoreError>;
}
