//! Record store adapter.
//!
//! This module defines the [`RecordStore`] trait that the rest of the
//! pipeline is written against, plus two implementations: an HTTP client for
//! the external records API and an in-memory backend used for dry runs and
//! tests.
//!
//! # Example
//!
//! ```ignore
//! use scribe::store::{RecordFilter, RecordStore};
//!
//! async fn count_records<S: RecordStore>(store: &S, project: &str) -> usize {
//!     let mut total = 0;
//!     let mut cursor = None;
//!     loop {
//!         let page = store
//!             .query_page(&RecordFilter::project(project), cursor)
//!             .await
//!             .unwrap_or_default();
//!         total += page.records.len();
//!         match page.next_cursor {
//!             Some(next) => cursor = Some(next),
//!             None => break,
//!         }
//!     }
//!     total
//! }
//! ```

mod errors;
mod http;
mod memory;
mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use errors::{Result, StoreError};
pub use http::{HttpRecordStore, StoreConfig};
pub use memory::MemoryStore;
pub use types::{FieldProbe, NewRecord, QUERY_PAGE_SIZE, RecordFilter, RecordPage, StoredRecord};

/// Interface to the external record store.
///
/// Implementations perform the create/query operations the pipeline needs
/// and map transport failures into [`StoreError`]. Everything above this
/// trait is store-agnostic.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one page of records matching `filter`.
    ///
    /// Pass the `next_cursor` from the previous page to continue; `None`
    /// starts from the beginning.
    async fn query_page(&self, filter: &RecordFilter, cursor: Option<String>)
    -> Result<RecordPage>;

    /// Create one record.
    ///
    /// A store that enforces uniqueness reports duplicates as
    /// [`StoreError::Conflict`]; callers treat that as a skip, not a
    /// failure.
    async fn create_record(&self, record: &NewRecord) -> Result<()>;

    /// Most recent stored commit timestamp for a project, if any.
    ///
    /// This is the sync cursor used to bound incremental backfill windows.
    async fn newest_timestamp(&self, project: &str) -> Result<Option<DateTime<Utc>>>;

    /// Probe the destination schema for the identifier column.
    async fn probe_identifier_field(&self) -> FieldProbe;

    /// Attempt to add the identifier column to the destination schema.
    async fn add_identifier_field(&self) -> Result<()>;

    /// Check whether a record with this identifier already exists.
    ///
    /// This is the race guard issued immediately before each write; it
    /// covers staleness in the dedup cache when multiple ingestion paths
    /// target the same project concurrently.
    async fn record_exists(&self, project: &str, identifier: &str) -> Result<bool> {
        let filter = RecordFilter::identity(project, identifier);
        let page = self.query_page(&filter, None).await?;
        Ok(!page.records.is_empty())
    }
}
