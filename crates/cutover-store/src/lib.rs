//! Cutover Store - record model and storage engine adapters
//!
//! Provides the uniform store surface the migration layer routes through:
//! - `Record`: the migrated entity
//! - `RecordStore`: the adapter trait both engines implement
//! - `DocumentStore`: loosely-typed JSON document engine with native
//!   aggregation
//! - `ColumnStore`: typed row engine, aggregation by full scan
//!
//! Both engines are embedded and optionally snapshot to disk, so the
//! operator tooling keeps working across process restarts.

pub mod column;
pub mod document;
pub mod error;
pub mod record;
pub mod store;

pub use column::ColumnStore;
pub use document::DocumentStore;
pub use error::StoreError;
pub use record::{Record, SortKey, SortKeyParseError};
pub use store::{BatchOutcome, RecordStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
