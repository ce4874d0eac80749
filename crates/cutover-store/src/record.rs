//! The migrated entity and its orderings
//!
//! A `Record` is created exactly once through the write path and never
//! updated in place. Both engines return records through `sort_records`
//! so listing order is identical regardless of which store serves a read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A single stored record.
///
/// `id` is assigned once by the allocator and immutable thereafter.
/// `owner` is never empty after insertion; defaulting happens centrally
/// in the router before persistence, not per adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Globally unique identifier, strictly increasing per authoritative store
    pub id: u64,
    /// Title, non-empty at creation
    pub title: String,
    /// Body text, required at creation (empty string allowed)
    pub content: String,
    /// Owning author, never empty after insertion
    pub owner: String,
    /// Creation timestamp, stamped by the write path
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Create a fully-populated record.
    #[inline]
    #[must_use]
    pub fn new(
        id: u64,
        title: impl Into<String>,
        content: impl Into<String>,
        owner: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            owner: owner.into(),
            created_at,
        }
    }
}

/// Listing order for `RecordStore::list_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Newest first (`created_at` descending)
    Date,
    /// Case-insensitive title, ascending
    Title,
}

impl Default for SortKey {
    fn default() -> Self {
        Self::Date
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date => write!(f, "date"),
            Self::Title => write!(f, "title"),
        }
    }
}

/// Error for unrecognized sort key strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key: {0} (expected \"date\" or \"title\")")]
pub struct SortKeyParseError(pub String);

impl FromStr for SortKey {
    type Err = SortKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(Self::Date),
            "title" => Ok(Self::Title),
            other => Err(SortKeyParseError(other.to_string())),
        }
    }
}

/// Sort records in place for the given key.
///
/// Ties break by `id` ascending so listings are deterministic even when
/// timestamps or titles collide.
pub fn sort_records(records: &mut [Record], sort: SortKey) {
    match sort {
        SortKey::Date => {
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        }
        SortKey::Title => {
            records.sort_by(|a, b| {
                a.title
                    .to_lowercase()
                    .cmp(&b.title.to_lowercase())
                    .then(a.id.cmp(&b.id))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn sort_key_round_trip() {
        assert_eq!("date".parse::<SortKey>().unwrap(), SortKey::Date);
        assert_eq!("title".parse::<SortKey>().unwrap(), SortKey::Title);
        assert!("author".parse::<SortKey>().is_err());
        assert_eq!(SortKey::Title.to_string(), "title");
    }

    #[test]
    fn date_sort_is_newest_first_with_id_tiebreak() {
        let mut records = vec![
            Record::new(2, "b", "", "x", at(100)),
            Record::new(1, "a", "", "x", at(100)),
            Record::new(3, "c", "", "x", at(200)),
        ];
        sort_records(&mut records, SortKey::Date);
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn title_sort_is_case_insensitive() {
        let mut records = vec![
            Record::new(1, "banana", "", "x", at(1)),
            Record::new(2, "Apple", "", "x", at(2)),
            Record::new(3, "apple", "", "x", at(3)),
        ];
        sort_records(&mut records, SortKey::Title);
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn record_serializes_created_at_as_camel_case() {
        let record = Record::new(1, "t", "c", "o", at(0));
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("createdAt").is_some());
    }
}
