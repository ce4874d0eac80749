//! Bulk copy and reconciliation flows
//!
//! Covers dry runs, idempotent retries, partial-failure tolerance, and
//! the reconciliation report an operator gates cutover on.

use chrono::{Duration, TimeZone, Utc};
use cutover_core::{
    BatchMigrator, Discrepancy, FieldName, MigrateOptions, Reconciler, DEFAULT_OWNER,
};
use cutover_store::{ColumnStore, DocumentStore, Record, RecordStore};

fn record(id: u64, title: &str, owner: &str, secs: i64) -> Record {
    Record::new(
        id,
        title,
        format!("content of {title}"),
        owner,
        Utc.timestamp_opt(secs, 0).unwrap(),
    )
}

async fn seeded_source() -> DocumentStore {
    let source = DocumentStore::in_memory("source");
    for r in [
        record(1, "Welcome", "ada", 100),
        record(2, "Second post", "bob", 200),
        record(3, "Third post", "", 300),
        record(4, "Fourth post", "ada", 400),
        record(5, "Fifth post", "eve", 500),
    ] {
        source.insert(r).await.unwrap();
    }
    source
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let source = seeded_source().await;
    let target = ColumnStore::in_memory("target");

    let report = BatchMigrator::default()
        .run(&source, &target, &MigrateOptions::new().dry_run())
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.scanned, 5);
    assert_eq!(report.migrated, 5);
    assert!(report.is_complete());
    assert_eq!(target.count().await.unwrap(), 0);
}

#[tokio::test]
async fn live_run_copies_everything_and_defaults_owners() {
    let source = seeded_source().await;
    let target = ColumnStore::in_memory("target");

    let report = BatchMigrator::default()
        .run(&source, &target, &MigrateOptions::new().with_batch_size(2))
        .await
        .unwrap();

    assert_eq!(report.migrated, 5);
    assert_eq!(report.already_present, 0);
    assert!(report.is_complete());
    assert_eq!(target.count().await.unwrap(), 5);

    let counts = target.count_by_owner().await.unwrap();
    assert_eq!(counts.get(DEFAULT_OWNER), Some(&1));
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let source = seeded_source().await;
    let target = ColumnStore::in_memory("target");
    let migrator = BatchMigrator::default();
    let options = MigrateOptions::new();

    migrator.run(&source, &target, &options).await.unwrap();
    let count_after_first = target.count().await.unwrap();

    let second = migrator.run(&source, &target, &options).await.unwrap();
    assert_eq!(second.migrated, 0);
    assert_eq!(second.already_present, 5);
    assert!(second.is_complete());
    assert_eq!(target.count().await.unwrap(), count_after_first);
}

#[tokio::test]
async fn unreachable_target_records_failures_and_retry_recovers() {
    let source = seeded_source().await;
    let target = ColumnStore::in_memory("target");
    let migrator = BatchMigrator::default();
    let options = MigrateOptions::new().with_batch_size(2);

    target.set_connected(false);
    let failed_run = migrator.run(&source, &target, &options).await.unwrap();
    assert_eq!(failed_run.migrated, 0);
    assert_eq!(failed_run.failed.len(), 5);
    assert!(!failed_run.is_complete());

    target.set_connected(true);
    let retry = migrator.run(&source, &target, &options).await.unwrap();
    assert_eq!(retry.migrated, 5);
    assert!(retry.is_complete());
    assert_eq!(target.count().await.unwrap(), 5);
}

#[tokio::test]
async fn unreachable_source_aborts_the_run() {
    let source = seeded_source().await;
    source.set_connected(false);
    let target = ColumnStore::in_memory("target");

    let result = BatchMigrator::default()
        .run(&source, &target, &MigrateOptions::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn migrated_stores_verify_with_known_owner_drift() {
    let source = seeded_source().await;
    let target = ColumnStore::in_memory("target");
    BatchMigrator::default()
        .run(&source, &target, &MigrateOptions::new())
        .await
        .unwrap();

    let report = Reconciler::new().verify(&source, &target).await.unwrap();
    assert!(report.counts_match());
    assert_eq!(report.compared, 5);
    // Record 3 had an empty owner in the source; the copy was defaulted,
    // so reconciliation flags exactly that field.
    assert_eq!(report.matched, 4);
    assert_eq!(
        report.discrepancies,
        vec![Discrepancy::FieldMismatch {
            id: 3,
            fields: vec![FieldName::Owner],
        }]
    );
}

#[tokio::test]
async fn identical_stores_verify_clean() {
    let source = DocumentStore::in_memory("source");
    let target = ColumnStore::in_memory("target");
    for r in [record(1, "a", "ada", 1), record(2, "b", "bob", 2)] {
        source.insert(r.clone()).await.unwrap();
        target.insert(r).await.unwrap();
    }

    let report = Reconciler::new().verify(&source, &target).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.compared, 2);
    assert_eq!(report.matched, 2);
    assert!(report.discrepancies.is_empty());
    assert!(report.timestamp_advisories.is_empty());
}

#[tokio::test]
async fn injected_title_difference_names_the_field() {
    let source = DocumentStore::in_memory("source");
    let target = ColumnStore::in_memory("target");
    source.insert(record(1, "Original", "ada", 10)).await.unwrap();
    target.insert(record(1, "Tampered", "ada", 10)).await.unwrap();

    let report = Reconciler::new().verify(&source, &target).await.unwrap();
    assert!(!report.is_clean());
    assert_eq!(
        report.discrepancies,
        vec![Discrepancy::FieldMismatch {
            id: 1,
            fields: vec![FieldName::Title],
        }]
    );
}

#[tokio::test]
async fn missing_ids_are_reported_on_both_sides() {
    let source = DocumentStore::in_memory("source");
    let target = ColumnStore::in_memory("target");
    source.insert(record(1, "both", "ada", 1)).await.unwrap();
    source.insert(record(2, "source only", "ada", 2)).await.unwrap();
    target.insert(record(1, "both", "ada", 1)).await.unwrap();
    target.insert(record(3, "target only", "eve", 3)).await.unwrap();

    let report = Reconciler::new().verify(&source, &target).await.unwrap();
    assert_eq!(report.compared, 1);
    assert_eq!(report.matched, 1);
    assert_eq!(
        report.discrepancies,
        vec![
            Discrepancy::MissingInTarget { id: 2 },
            Discrepancy::MissingInSource { id: 3 },
        ]
    );
}

#[tokio::test]
async fn timestamp_skew_is_advisory_not_a_mismatch() {
    let source = DocumentStore::in_memory("source");
    let target = ColumnStore::in_memory("target");
    source.insert(record(1, "same", "ada", 100)).await.unwrap();
    target.insert(record(1, "same", "ada", 105)).await.unwrap();

    let report = Reconciler::new().verify(&source, &target).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.matched, 1);
    assert_eq!(report.timestamp_advisories.len(), 1);
    assert_eq!(report.timestamp_advisories[0].id, 1);

    // Within tolerance nothing is reported.
    let tolerant = Reconciler::new()
        .with_created_at_tolerance(Duration::seconds(10))
        .verify(&source, &target)
        .await
        .unwrap();
    assert!(tolerant.timestamp_advisories.is_empty());
}
