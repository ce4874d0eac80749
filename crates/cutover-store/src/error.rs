//! Store-level error types
//!
//! Adapter errors are never swallowed: they propagate to the router,
//! which surfaces them on primary paths and downgrades them to drift
//! warnings on shadow paths.

/// Errors raised by a `RecordStore` adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The underlying engine cannot be reached (transient; caller retries)
    #[error("store unavailable: {store}")]
    Unavailable {
        /// Adapter name
        store: String,
    },

    /// An id collision: allocator defect on a live write, safe no-op on
    /// migration replay
    #[error("duplicate record id {id} in {store}")]
    DuplicateKey {
        /// Adapter name
        store: String,
        /// The colliding identifier
        id: u64,
    },

    /// Durable snapshot could not be written or read
    #[error("snapshot failed for {store}: {reason}")]
    Snapshot {
        /// Adapter name
        store: String,
        /// Underlying cause
        reason: String,
    },
}

impl StoreError {
    /// Whether this is an id collision.
    #[inline]
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Whether the caller may retry after the engine comes back.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_classification() {
        let err = StoreError::DuplicateKey {
            store: "source".to_string(),
            id: 7,
        };
        assert!(err.is_duplicate());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("duplicate record id 7"));
    }

    #[test]
    fn unavailable_is_transient() {
        let err = StoreError::Unavailable {
            store: "target".to_string(),
        };
        assert!(err.is_transient());
    }
}
