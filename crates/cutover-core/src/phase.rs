//! Migration phase state machine and routing table
//!
//! The phase is process-wide state persisted outside memory so it
//! survives restarts. Routing is a single table driven by the phase enum,
//! so adding a phase or changing routing is a one-place edit.
//!
//! Transitions are unconditionally allowed between any of the four
//! phases; the reference behavior treats out-of-order transitions as
//! operator flexibility.

use crate::error::CoreError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Stage of migration progress, in cutover order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    /// All reads and writes use the source store only
    SourceOnly,
    /// Writes go to both stores, reads from the source
    DualWrite,
    /// Writes go to both stores, reads from the target
    ReadTarget,
    /// All reads and writes use the target store only
    TargetOnly,
}

impl MigrationPhase {
    /// All phases in cutover order.
    pub const ALL: [MigrationPhase; 4] = [
        Self::SourceOnly,
        Self::DualWrite,
        Self::ReadTarget,
        Self::TargetOnly,
    ];

    /// One-line operator description.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::SourceOnly => "all reads/writes use the source store only",
            Self::DualWrite => "writes go to both stores, reads from the source",
            Self::ReadTarget => "writes go to both stores, reads from the target",
            Self::TargetOnly => "all reads/writes use the target store only",
        }
    }

    /// The routing table. Single point of truth for which store serves
    /// reads, which takes the primary write, and whether a shadow write
    /// is mandated.
    #[must_use]
    pub fn route_plan(self) -> RoutePlan {
        match self {
            Self::SourceOnly => RoutePlan {
                read: Side::Source,
                primary_write: Side::Source,
                shadow_write: None,
            },
            Self::DualWrite => RoutePlan {
                read: Side::Source,
                primary_write: Side::Source,
                shadow_write: Some(Side::Target),
            },
            Self::ReadTarget => RoutePlan {
                read: Side::Target,
                primary_write: Side::Source,
                shadow_write: Some(Side::Target),
            },
            Self::TargetOnly => RoutePlan {
                read: Side::Target,
                primary_write: Side::Target,
                shadow_write: None,
            },
        }
    }
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SourceOnly => "source_only",
            Self::DualWrite => "dual_write",
            Self::ReadTarget => "read_target",
            Self::TargetOnly => "target_only",
        };
        write!(f, "{name}")
    }
}

impl FromStr for MigrationPhase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source_only" => Ok(Self::SourceOnly),
            "dual_write" => Ok(Self::DualWrite),
            "read_target" => Ok(Self::ReadTarget),
            "target_only" => Ok(Self::TargetOnly),
            other => Err(CoreError::UnknownPhase(other.to_string())),
        }
    }
}

/// Which of the two stores an operation is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The store being migrated away from
    Source,
    /// The store being migrated onto
    Target,
}

/// Per-phase routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePlan {
    /// Store that serves reads
    pub read: Side,
    /// Store whose write success determines the caller-visible outcome
    pub primary_write: Side,
    /// Best-effort mirrored write, if the phase mandates one
    pub shadow_write: Option<Side>,
}

/// Durable storage for the active phase.
///
/// A single key-value entry, read at startup and written synchronously on
/// every transition.
pub trait PhaseStore: Send + Sync + std::fmt::Debug {
    /// The persisted phase, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<MigrationPhase>, CoreError>;

    /// Persist the phase. Must be durable before returning.
    fn save(&self, phase: MigrationPhase) -> Result<(), CoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedPhase {
    #[serde(rename = "migrationPhase")]
    phase: MigrationPhase,
}

/// File-backed phase store: one JSON document, replaced atomically.
#[derive(Debug)]
pub struct FilePhaseStore {
    path: PathBuf,
}

impl FilePhaseStore {
    /// Create a store persisting to `path`. The file is created on first
    /// save.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl PhaseStore for FilePhaseStore {
    fn load(&self) -> Result<Option<MigrationPhase>, CoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| CoreError::Persistence(e.to_string()))?;
        let persisted: PersistedPhase =
            serde_json::from_str(&raw).map_err(|e| CoreError::Persistence(e.to_string()))?;
        Ok(Some(persisted.phase))
    }

    fn save(&self, phase: MigrationPhase) -> Result<(), CoreError> {
        let raw = serde_json::to_string_pretty(&PersistedPhase { phase })
            .map_err(|e| CoreError::Persistence(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| CoreError::Persistence(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CoreError::Persistence(e.to_string()))?;
        Ok(())
    }
}

/// In-memory phase store for tests; can be told to fail saves.
#[derive(Debug, Default)]
pub struct InMemoryPhaseStore {
    slot: parking_lot::Mutex<Option<MigrationPhase>>,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl InMemoryPhaseStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with a persistence error.
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

impl PhaseStore for InMemoryPhaseStore {
    fn load(&self) -> Result<Option<MigrationPhase>, CoreError> {
        Ok(*self.slot.lock())
    }

    fn save(&self, phase: MigrationPhase) -> Result<(), CoreError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CoreError::Persistence(
                "phase store rejected the write".to_string(),
            ));
        }
        *self.slot.lock() = Some(phase);
        Ok(())
    }
}

/// Holds the active phase and validates/persists transitions.
#[derive(Debug)]
pub struct PhaseController {
    store: Box<dyn PhaseStore>,
    current: RwLock<MigrationPhase>,
}

impl PhaseController {
    /// Load the persisted phase, defaulting to `SourceOnly` when nothing
    /// was ever saved.
    pub fn new(store: Box<dyn PhaseStore>) -> Result<Self, CoreError> {
        let current = store.load()?.unwrap_or(MigrationPhase::SourceOnly);
        Ok(Self {
            store,
            current: RwLock::new(current),
        })
    }

    /// The active phase.
    #[inline]
    #[must_use]
    pub fn current_phase(&self) -> MigrationPhase {
        *self.current.read()
    }

    /// Routing decisions for the active phase.
    #[inline]
    #[must_use]
    pub fn route_plan(&self) -> RoutePlan {
        self.current_phase().route_plan()
    }

    /// Transition to `phase`, persisting synchronously first. On a
    /// persistence failure the in-memory phase is left unchanged and the
    /// prior phase remains authoritative.
    pub fn set_phase(&self, phase: MigrationPhase) -> Result<(), CoreError> {
        let mut current = self.current.write();
        self.store.save(phase)?;
        let previous = *current;
        *current = phase;
        tracing::info!(%previous, new = %phase, "migration phase changed");
        Ok(())
    }
}
