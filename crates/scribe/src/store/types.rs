use chrono::{DateTime, Utc};

use crate::commit::{CommitRecord, truncate_message};

/// Number of records requested per query page.
pub const QUERY_PAGE_SIZE: usize = 100;

/// A record as it exists in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Store-assigned record id.
    pub id: String,
    /// Owning project in `owner/name` form.
    pub project: String,
    /// Source revision id, when the schema has an identifier column.
    pub identifier: Option<String>,
    /// Stored (possibly truncated) commit message.
    pub message: String,
    /// When the change was authored.
    pub committed_at: DateTime<Utc>,
    /// Link back to the source system.
    pub url: Option<String>,
}

/// A record to be created in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Owning project in `owner/name` form.
    pub project: String,
    /// Source revision id; omitted when the schema lacks the column.
    pub identifier: Option<String>,
    /// Commit message, truncated to the store's field limit.
    pub message: String,
    /// When the change was authored.
    pub committed_at: DateTime<Utc>,
    /// Link back to the source system.
    pub url: String,
}

impl NewRecord {
    /// Build a store record from a normalized commit.
    ///
    /// Message truncation happens here, at the storage boundary. The
    /// identifier is included only when the destination schema supports it.
    #[must_use]
    pub fn from_commit(commit: &CommitRecord, include_identifier: bool) -> Self {
        Self {
            project: commit.repository.clone(),
            identifier: include_identifier.then(|| commit.identifier.clone()),
            message: truncate_message(&commit.message),
            committed_at: commit.timestamp,
            url: commit.url.clone(),
        }
    }
}

/// Filter for record queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    /// Owning project in `owner/name` form.
    pub project: String,
    /// Optional identifier to match exactly.
    pub identifier: Option<String>,
}

impl RecordFilter {
    /// Match all records belonging to a project.
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            identifier: None,
        }
    }

    /// Match records for a project with a specific identifier.
    pub fn identity(project: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            identifier: Some(identifier.into()),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    /// Records on this page.
    pub records: Vec<StoredRecord>,
    /// Cursor for the next page, absent on the last page.
    pub next_cursor: Option<String>,
}

/// Result of probing the destination schema for the identifier column.
///
/// Consumed via normal branching; probe failures are a value, not an
/// exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProbe {
    /// The identifier column exists.
    Present,
    /// The schema was read and the column is missing.
    Absent,
    /// The probe itself failed (network or API error).
    Unknown,
}
