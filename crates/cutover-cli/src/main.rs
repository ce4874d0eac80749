//! Operator CLI for the cutover migration layer
//!
//! Workflow:
//! 1. `status` to check both stores and the active phase
//! 2. `migrate` to bulk-copy existing records to the target
//! 3. `verify` to confirm the stores agree
//! 4. `set-phase dual_write` / `read_target` / `target_only` to advance
//! 5. `cleanup` to drop source data after cutover

use anyhow::Context as _;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use cutover_core::{
    BatchMigrator, DualWriteRouter, FilePhaseStore, MigrateOptions, MigrationPhase,
    PhaseController, Reconciler, RouterConfig, DEFAULT_BATCH_SIZE,
};
use cutover_store::{ColumnStore, DocumentStore, Record, RecordStore};
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Stores {
    source: Arc<DocumentStore>,
    target: Arc<ColumnStore>,
    phases: Arc<PhaseController>,
}

impl Stores {
    /// Open both engines and the phase file under `data_dir`. Explicit
    /// construction at startup; no environment-driven ambient handles.
    fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;
        let source = Arc::new(
            DocumentStore::open("source", data_dir.join("source.json"))
                .context("opening source store")?,
        );
        let target = Arc::new(
            ColumnStore::open("target", data_dir.join("target.json"))
                .context("opening target store")?,
        );
        let phases = Arc::new(
            PhaseController::new(Box::new(FilePhaseStore::new(data_dir.join("phase.json"))))
                .context("loading migration phase")?,
        );
        Ok(Self {
            source,
            target,
            phases,
        })
    }

    fn router(&self) -> DualWriteRouter {
        DualWriteRouter::new(
            Arc::clone(&self.source) as Arc<dyn RecordStore>,
            Arc::clone(&self.target) as Arc<dyn RecordStore>,
            Arc::clone(&self.phases),
            RouterConfig::new(),
        )
    }
}

fn cli() -> Command {
    Command::new("cutover")
        .version(cutover_core::VERSION)
        .about("Live migration controller for the record store")
        .arg_required_else_help(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .default_value("./data")
                .help("Directory holding store snapshots and the phase file"),
        )
        .subcommand(
            Command::new("status")
                .about("Show the migration phase and both stores' connectivity/counts")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("migrate")
                .about("Bulk-copy all source records into the target")
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Report intended inserts without writing"),
                )
                .arg(
                    Arg::new("batch-size")
                        .long("batch-size")
                        .default_value("50")
                        .value_parser(value_parser!(usize))
                        .help("Records per bulk insert"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Compare counts and contents between the stores")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("set-phase")
                .about("Switch the migration phase")
                .arg(
                    Arg::new("phase")
                        .required(true)
                        .help("One of: source_only, dual_write, read_target, target_only"),
                ),
        )
        .subcommand(
            Command::new("cleanup")
                .about("Delete fully-migrated source data")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Proceed even when the phase is not target_only"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Show what would be deleted without deleting"),
                )
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Skip the interactive confirmation"),
                ),
        )
        .subcommand(
            Command::new("seed")
                .about("Populate the source store with sample records"),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let matches = cli().get_matches();
    let data_dir = matches
        .get_one::<String>("data-dir")
        .expect("has a default")
        .clone();
    let stores = Stores::open(Path::new(&data_dir))?;

    match matches.subcommand() {
        Some(("status", args)) => cmd_status(&stores, args).await,
        Some(("migrate", args)) => cmd_migrate(&stores, args).await,
        Some(("verify", args)) => cmd_verify(&stores, args).await,
        Some(("set-phase", args)) => cmd_set_phase(&stores, args),
        Some(("cleanup", args)) => cmd_cleanup(&stores, args).await,
        Some(("seed", _)) => cmd_seed(&stores).await,
        _ => Ok(()),
    }
}

async fn cmd_status(stores: &Stores, args: &ArgMatches) -> anyhow::Result<()> {
    let router = stores.router();
    let status = router.status().await;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Migration status");
    println!("  Phase: {}", status.phase);
    for snapshot in [&status.source, &status.target] {
        let count = snapshot
            .count
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "  {:6} connected={} count={}",
            snapshot.name, snapshot.connected, count
        );
    }
    println!("  Shadow-write failures: {}", status.shadow_write_failures);
    println!();
    println!("Phases:");
    for phase in MigrationPhase::ALL {
        let marker = if phase == status.phase { "->" } else { "  " };
        println!("  {marker} {:12} {}", phase.to_string(), phase.describe());
    }
    Ok(())
}

async fn cmd_migrate(stores: &Stores, args: &ArgMatches) -> anyhow::Result<()> {
    let batch_size = *args
        .get_one::<usize>("batch-size")
        .unwrap_or(&DEFAULT_BATCH_SIZE);
    let mut options = MigrateOptions::new().with_batch_size(batch_size);
    if args.get_flag("dry-run") {
        options = options.dry_run();
    }

    let report = BatchMigrator::default()
        .run(stores.source.as_ref(), stores.target.as_ref(), &options)
        .await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mode = if report.dry_run { " (dry run)" } else { "" };
        println!("Migration complete{mode}");
        println!("  Scanned:         {}", report.scanned);
        println!("  Migrated:        {}", report.migrated);
        println!("  Already present: {}", report.already_present);
        println!("  Failed:          {}", report.failed.len());
        for failure in &report.failed {
            println!("    id={} {}", failure.id, failure.reason);
        }
    }

    if !report.is_complete() {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_verify(stores: &Stores, args: &ArgMatches) -> anyhow::Result<()> {
    let report = Reconciler::new()
        .verify(stores.source.as_ref(), stores.target.as_ref())
        .await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Verification report");
        println!(
            "  Counts: source={} target={} ({})",
            report.source_count,
            report.target_count,
            if report.counts_match() {
                "match"
            } else {
                "MISMATCH"
            }
        );
        println!("  Compared: {}  Matched: {}", report.compared, report.matched);
        for discrepancy in &report.discrepancies {
            println!("  ! {discrepancy:?}");
        }
        for skew in &report.timestamp_advisories {
            println!(
                "  ~ id={} createdAt skew (source={}, target={})",
                skew.id, skew.source, skew.target
            );
        }
        if report.is_clean() {
            println!("  All data verified; cutover is safe from this report's point of view.");
        } else {
            println!("  Discrepancies found; reconcile before advancing the phase.");
        }
    }

    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_set_phase(stores: &Stores, args: &ArgMatches) -> anyhow::Result<()> {
    let raw = args.get_one::<String>("phase").expect("required arg");
    let phase: MigrationPhase = raw.parse()?;
    stores.phases.set_phase(phase)?;
    println!("Phase set to {phase}: {}", phase.describe());
    Ok(())
}

async fn cmd_cleanup(stores: &Stores, args: &ArgMatches) -> anyhow::Result<()> {
    let phase = stores.phases.current_phase();
    if phase != MigrationPhase::TargetOnly && !args.get_flag("force") {
        println!("Current phase is {phase}; cleanup requires target_only.");
        println!("Use --force to proceed anyway.");
        std::process::exit(1);
    }

    let count = stores.source.count().await?;
    if args.get_flag("dry-run") {
        println!("[dry run] Would delete {count} records from the source store.");
        return Ok(());
    }

    if !args.get_flag("yes") {
        print!("Delete all {count} source records? (yes/no): ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if answer.trim() != "yes" {
            println!("Cleanup cancelled.");
            return Ok(());
        }
    }

    let removed = stores.source.purge().await?;
    println!("Deleted {removed} records from the source store.");
    Ok(())
}

async fn cmd_seed(stores: &Stores) -> anyhow::Result<()> {
    let outcome = stores.source.insert_batch(sample_records()).await?;
    println!(
        "Inserted {} sample records into the source store.",
        outcome.inserted
    );
    Ok(())
}

/// Demo dataset for the `seed` command: staggered creation dates and a
/// small set of owners, shaped like a modest production store.
fn sample_records() -> Vec<Record> {
    let now = chrono::Utc::now();
    let posts = [
        ("Welcome to the Record Store", "First entry, kicking things off.", "ahmed", 10),
        ("Notes on Dual Writes", "Mirroring writes keeps the new store warm.", "sarah", 8),
        ("Batching for Throughput", "Bulk copies beat row-at-a-time by a wide margin.", "ahmed", 6),
        ("Reconcile Before Cutover", "Never flip the read path on unverified data.", "john", 4),
        ("Choosing a Sort Key", "Date for freshness, title for browsing.", "sarah", 2),
        ("Cutover Day", "Source store, thanks for your service.", "ahmed", 1),
    ];
    posts
        .into_iter()
        .enumerate()
        .map(|(i, (title, content, owner, days_ago))| {
            Record::new(
                i as u64 + 1,
                title,
                content,
                owner,
                now - chrono::Duration::days(days_ago),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn sample_records_are_well_formed() {
        let records = sample_records();
        assert!(!records.is_empty());
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        let expected: Vec<u64> = (1..=records.len() as u64).collect();
        assert_eq!(ids, expected);
        assert!(records.iter().all(|r| !r.owner.is_empty()));
    }

    #[tokio::test]
    async fn stores_open_creates_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested/data");
        let stores = Stores::open(&data_dir).unwrap();
        assert!(data_dir.exists());
        assert_eq!(
            stores.phases.current_phase(),
            MigrationPhase::SourceOnly
        );
    }
}
