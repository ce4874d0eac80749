//! Error types for the migration core
//!
//! Maps onto caller-visible behavior: `Validation` is bad input (never
//! retried), store errors pass through untouched on primary paths, and
//! `Persistence` rejects a phase change while the prior phase stays
//! authoritative.

use cutover_store::StoreError;

/// Main error type for router, controller, migrator, and reconciler.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad caller input; never retried automatically
    #[error("invalid input: {0}")]
    Validation(String),

    /// Adapter-level store error, propagated untouched
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Phase transition could not be persisted; the change is rejected
    #[error("phase persistence failed: {0}")]
    Persistence(String),

    /// Unrecognized phase name
    #[error("unknown migration phase: {0}")]
    UnknownPhase(String),
}

impl CoreError {
    /// Whether this maps to a 4xx-equivalent caller mistake.
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::UnknownPhase(_))
    }
}
