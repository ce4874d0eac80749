//! Batched bulk copy from source to target
//!
//! Best-effort and restartable: per-record and per-batch failures are
//! recorded in the report and processing continues. A record already
//! present in the target counts as `already_present`, so re-running after
//! a partial failure is idempotent. Records inserted after the scan began
//! are simply not covered by this run; a later reconciliation pass
//! catches them.

use crate::error::CoreError;
use crate::router::DEFAULT_OWNER;
use cutover_store::{Record, RecordStore, SortKey};
use serde::Serialize;

/// Default records per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Options for one migration run.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Records per bulk insert submitted to the target
    pub batch_size: usize,
    /// Report intended inserts without touching the target
    pub dry_run: bool,
}

impl MigrateOptions {
    /// Defaults: batch size 50, live run.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different batch size.
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable dry-run mode.
    #[inline]
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

/// A record the run could not copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    /// Identifier of the record that failed
    pub id: u64,
    /// Why it failed
    pub reason: String,
}

/// Summary of one migration run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Source records enumerated by the scan
    pub scanned: u64,
    /// Records newly copied (or, in a dry run, that would be copied)
    pub migrated: u64,
    /// Records skipped because the target already held the id
    pub already_present: u64,
    /// Records that could not be copied
    pub failed: Vec<FailedRecord>,
    /// Whether this was a dry run
    pub dry_run: bool,
}

impl MigrationReport {
    /// Whether every scanned record is accounted for without failure.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Bulk copier between two stores.
#[derive(Debug)]
pub struct BatchMigrator {
    default_owner: String,
}

impl BatchMigrator {
    /// Migrator applying `default_owner` to records with an empty owner.
    #[inline]
    #[must_use]
    pub fn new(default_owner: impl Into<String>) -> Self {
        Self {
            default_owner: default_owner.into(),
        }
    }

    /// Copy every source record into the target in bounded batches.
    ///
    /// Fails only when the source cannot be enumerated at all; everything
    /// past that point is accumulated into the report.
    pub async fn run(
        &self,
        source: &dyn RecordStore,
        target: &dyn RecordStore,
        options: &MigrateOptions,
    ) -> Result<MigrationReport, CoreError> {
        // Enumeration order is not a migration requirement; date order is
        // as good as any. Textual legacy timestamps were already
        // normalized at the document decode boundary (lossy fallback to
        // "now" for unreadable values).
        let records = source.list_all(SortKey::Date).await?;

        let mut report = MigrationReport {
            scanned: records.len() as u64,
            dry_run: options.dry_run,
            ..MigrationReport::default()
        };
        tracing::info!(
            source = %source.name(),
            target = %target.name(),
            scanned = report.scanned,
            dry_run = options.dry_run,
            "migration run started"
        );

        let normalized: Vec<Record> = records
            .into_iter()
            .map(|record| self.normalize(record))
            .collect();

        if options.dry_run {
            for record in &normalized {
                tracing::debug!(record_id = record.id, title = %record.title, "would migrate");
            }
            report.migrated = report.scanned;
            return Ok(report);
        }

        let batch_size = options.batch_size.max(1);
        for batch in normalized.chunks(batch_size) {
            match target.insert_batch(batch.to_vec()).await {
                Ok(outcome) => {
                    report.migrated += outcome.inserted;
                    report.already_present += outcome.already_present;
                    report
                        .failed
                        .extend(outcome.failed.into_iter().map(|(id, reason)| FailedRecord {
                            id,
                            reason,
                        }));
                }
                Err(err) => {
                    // The whole batch failed; record every id and keep
                    // going so a retry can pick these up.
                    tracing::error!(error = %err, "batch insert failed");
                    report.failed.extend(batch.iter().map(|record| FailedRecord {
                        id: record.id,
                        reason: err.to_string(),
                    }));
                }
            }
            tracing::info!(
                migrated = report.migrated,
                already_present = report.already_present,
                failed = report.failed.len(),
                "migration progress"
            );
        }

        Ok(report)
    }

    fn normalize(&self, mut record: Record) -> Record {
        if record.owner.trim().is_empty() {
            record.owner = self.default_owner.clone();
        }
        record
    }
}

impl Default for BatchMigrator {
    fn default() -> Self {
        Self::new(DEFAULT_OWNER)
    }
}
