//! Cross-store reconciliation
//!
//! Compares counts and field-level contents between the two stores. The
//! report is the gating signal an operator reads before advancing the
//! phase toward cutover. Mismatches are reported, never auto-healed.

use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use cutover_store::{Record, RecordStore, SortKey};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One inconsistency between the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// The id exists in the source but not the target
    MissingInTarget {
        /// The absent identifier
        id: u64,
    },
    /// The id exists in the target but not the source
    MissingInSource {
        /// The absent identifier
        id: u64,
    },
    /// Both stores hold the id with differing field contents
    FieldMismatch {
        /// The identifier whose contents differ
        id: u64,
        /// Which fields differ
        fields: Vec<FieldName>,
    },
}

/// Compared record fields. `created_at` is deliberately absent: timestamp
/// comparison is advisory only, since cross-store precision may
/// legitimately differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    /// `title` differs
    Title,
    /// `content` differs
    Content,
    /// `owner` differs
    Owner,
}

/// Advisory note: both stores hold the id but the creation timestamps
/// differ beyond the tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampSkew {
    /// Affected identifier
    pub id: u64,
    /// Source-side timestamp
    pub source: DateTime<Utc>,
    /// Target-side timestamp
    pub target: DateTime<Utc>,
}

/// Structured result of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Live count in the source store
    pub source_count: u64,
    /// Live count in the target store
    pub target_count: u64,
    /// Ids present in both stores and compared field-by-field
    pub compared: u64,
    /// Compared ids with identical `title`, `content`, and `owner`
    pub matched: u64,
    /// Missing and mismatched ids
    pub discrepancies: Vec<Discrepancy>,
    /// Timestamp skews, advisory only
    pub timestamp_advisories: Vec<TimestampSkew>,
}

impl VerifyReport {
    /// Whether both stores report the same live count.
    #[inline]
    #[must_use]
    pub fn counts_match(&self) -> bool {
        self.source_count == self.target_count
    }

    /// Whether cutover is safe from this report's point of view.
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.counts_match() && self.discrepancies.is_empty()
    }
}

/// Field-level comparator between two stores.
#[derive(Debug)]
pub struct Reconciler {
    created_at_tolerance: Duration,
}

impl Reconciler {
    /// Reconciler with the default one-second timestamp tolerance.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different timestamp tolerance.
    #[inline]
    #[must_use]
    pub fn with_created_at_tolerance(mut self, tolerance: Duration) -> Self {
        self.created_at_tolerance = tolerance;
        self
    }

    /// Compare counts and contents of both stores.
    ///
    /// A count mismatch is reported but never aborts the field-level
    /// comparison. Fails only when either store cannot be read at all.
    pub async fn verify(
        &self,
        source: &dyn RecordStore,
        target: &dyn RecordStore,
    ) -> Result<VerifyReport, CoreError> {
        let source_count = source.count().await?;
        let target_count = target.count().await?;
        if source_count != target_count {
            tracing::warn!(source_count, target_count, "record counts differ");
        }

        let source_map = keyed_by_id(source.list_all(SortKey::Date).await?);
        let target_map = keyed_by_id(target.list_all(SortKey::Date).await?);

        let all_ids: BTreeSet<u64> = source_map.keys().chain(target_map.keys()).copied().collect();

        let mut report = VerifyReport {
            source_count,
            target_count,
            compared: 0,
            matched: 0,
            discrepancies: Vec::new(),
            timestamp_advisories: Vec::new(),
        };

        for id in all_ids {
            match (source_map.get(&id), target_map.get(&id)) {
                (Some(_), None) => report.discrepancies.push(Discrepancy::MissingInTarget { id }),
                (None, Some(_)) => report.discrepancies.push(Discrepancy::MissingInSource { id }),
                (Some(src), Some(tgt)) => {
                    report.compared += 1;

                    let mut fields = Vec::new();
                    if src.title != tgt.title {
                        fields.push(FieldName::Title);
                    }
                    if src.content != tgt.content {
                        fields.push(FieldName::Content);
                    }
                    if src.owner != tgt.owner {
                        fields.push(FieldName::Owner);
                    }

                    if fields.is_empty() {
                        report.matched += 1;
                    } else {
                        report
                            .discrepancies
                            .push(Discrepancy::FieldMismatch { id, fields });
                    }

                    let skew = src.created_at - tgt.created_at;
                    if skew.abs() > self.created_at_tolerance {
                        report.timestamp_advisories.push(TimestampSkew {
                            id,
                            source: src.created_at,
                            target: tgt.created_at,
                        });
                    }
                }
                (None, None) => unreachable!("id came from the union of both key sets"),
            }
        }

        tracing::info!(
            compared = report.compared,
            matched = report.matched,
            discrepancies = report.discrepancies.len(),
            clean = report.is_clean(),
            "reconciliation finished"
        );
        Ok(report)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            created_at_tolerance: Duration::seconds(1),
        }
    }
}

fn keyed_by_id(records: Vec<Record>) -> BTreeMap<u64, Record> {
    records
        .into_iter()
        .map(|record| (record.id, record))
        .collect()
}
