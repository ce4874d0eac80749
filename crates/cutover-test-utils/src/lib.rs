//! Shared fixtures for the cutover workspace
//!
//! Consumed by integration tests that need a wired router without
//! repeating the store/controller plumbing.

use cutover_core::{
    DualWriteRouter, InMemoryPhaseStore, MigrationPhase, PhaseController, RouterConfig,
};
use cutover_store::{ColumnStore, DocumentStore, RecordStore};
use std::sync::Arc;

/// A fresh in-memory source/target pair.
#[must_use]
pub fn paired_stores() -> (Arc<DocumentStore>, Arc<ColumnStore>) {
    (
        Arc::new(DocumentStore::in_memory("source")),
        Arc::new(ColumnStore::in_memory("target")),
    )
}

/// A full router over in-memory stores, pinned to `phase`.
#[must_use]
pub fn router_with_phase(
    phase: MigrationPhase,
) -> (Arc<DualWriteRouter>, Arc<DocumentStore>, Arc<ColumnStore>) {
    let (source, target) = paired_stores();
    let phases = Arc::new(
        PhaseController::new(Box::new(InMemoryPhaseStore::new()))
            .expect("in-memory phase store cannot fail to load"),
    );
    phases.set_phase(phase).expect("in-memory save cannot fail");
    let router = Arc::new(DualWriteRouter::new(
        Arc::clone(&source) as Arc<dyn RecordStore>,
        Arc::clone(&target) as Arc<dyn RecordStore>,
        phases,
        RouterConfig::new(),
    ));
    (router, source, target)
}
