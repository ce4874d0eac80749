//! Cutover Core - phase-aware live migration layer
//!
//! The engine behind a zero-downtime store migration:
//! - `PhaseController`: durable migration phase plus the routing table
//! - `IdAllocator`: serialized next-id allocation per authoritative store
//! - `DualWriteRouter`: the phase-aware façade client operations enter
//! - `BatchMigrator`: batched, restartable bulk copy
//! - `Reconciler`: cross-store consistency reports gating cutover
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cutover_core::{DualWriteRouter, InMemoryPhaseStore, NewRecord, PhaseController, RouterConfig};
//! use cutover_store::{ColumnStore, DocumentStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let phases = Arc::new(PhaseController::new(Box::new(InMemoryPhaseStore::new()))?);
//! let router = DualWriteRouter::new(
//!     Arc::new(DocumentStore::in_memory("source")),
//!     Arc::new(ColumnStore::in_memory("target")),
//!     phases,
//!     RouterConfig::new(),
//! );
//!
//! let created = router.add_record(NewRecord::new("Hello", "World")).await?;
//! assert_eq!(created.record.id, 1);
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod error;
pub mod migrate;
pub mod phase;
pub mod router;
pub mod verify;

pub use allocator::{IdAllocator, IdReservation};
pub use error::CoreError;
pub use migrate::{BatchMigrator, FailedRecord, MigrateOptions, MigrationReport, DEFAULT_BATCH_SIZE};
pub use phase::{
    FilePhaseStore, InMemoryPhaseStore, MigrationPhase, PhaseController, PhaseStore, RoutePlan,
    Side,
};
pub use router::{
    CreatedRecord, DualWriteRouter, NewRecord, OwnerCount, RouterConfig, ShadowOutcome,
    StatusReport, StoreStatus, DEFAULT_OWNER,
};
pub use verify::{Discrepancy, FieldName, Reconciler, TimestampSkew, VerifyReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
