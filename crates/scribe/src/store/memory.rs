//! In-memory record store.
//!
//! Behaves like the HTTP backend as observed through the [`RecordStore`]
//! trait (pagination, filters, optional identifier column) but keeps
//! everything in process memory. Used for dry runs and as the store double
//! in tests. Writes are appended blindly, exactly like the real store: the
//! pipeline's dedup layers are what prevent duplicates, not this backend.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::RecordStore;
use super::errors::Result;
use super::types::{
    FieldProbe, NewRecord, QUERY_PAGE_SIZE, RecordFilter, RecordPage, StoredRecord,
};

/// In-memory [`RecordStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Inner {
    records: Vec<StoredRecord>,
    identifier_field: bool,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            identifier_field: true,
        }
    }
}

impl MemoryStore {
    /// Create an empty store whose schema has the identifier column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose schema lacks the identifier column,
    /// mimicking a legacy destination.
    pub fn without_identifier_field() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: Vec::new(),
                identifier_field: false,
            }),
        }
    }

    /// Snapshot of all stored records.
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.lock().records.clone()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn query_page(
        &self,
        filter: &RecordFilter,
        cursor: Option<String>,
    ) -> Result<RecordPage> {
        let inner = self.lock();

        let matching: Vec<StoredRecord> = inner
            .records
            .iter()
            .filter(|r| r.project == filter.project)
            .filter(|r| match &filter.identifier {
                Some(id) => r.identifier.as_deref() == Some(id.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        let offset: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (offset + QUERY_PAGE_SIZE).min(matching.len());
        let records = matching
            .get(offset..end)
            .map(<[StoredRecord]>::to_vec)
            .unwrap_or_default();
        let next_cursor = (end < matching.len()).then(|| end.to_string());

        Ok(RecordPage {
            records,
            next_cursor,
        })
    }

    async fn create_record(&self, record: &NewRecord) -> Result<()> {
        let mut inner = self.lock();

        let identifier = if inner.identifier_field {
            record.identifier.clone()
        } else {
            None
        };

        inner.records.push(StoredRecord {
            id: Uuid::new_v4().to_string(),
            project: record.project.clone(),
            identifier,
            message: record.message.clone(),
            committed_at: record.committed_at,
            url: Some(record.url.clone()),
        });

        Ok(())
    }

    async fn newest_timestamp(&self, project: &str) -> Result<Option<DateTime<Utc>>> {
        let inner = self.lock();
        Ok(inner
            .records
            .iter()
            .filter(|r| r.project == project)
            .map(|r| r.committed_at)
            .max())
    }

    async fn probe_identifier_field(&self) -> FieldProbe {
        if self.lock().identifier_field {
            FieldProbe::Present
        } else {
            FieldProbe::Absent
        }
    }

    async fn add_identifier_field(&self) -> Result<()> {
        self.lock().identifier_field = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(project: &str, identifier: &str, hour: u32) -> NewRecord {
        NewRecord {
            project: project.to_string(),
            identifier: Some(identifier.to_string()),
            message: format!("commit {identifier}"),
            committed_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            url: format!("https://example.com/c/{identifier}"),
        }
    }

    #[tokio::test]
    async fn query_filters_by_project() {
        let store = MemoryStore::new();
        store.create_record(&record("acme/widgets", "a", 1)).await.unwrap();
        store.create_record(&record("acme/gears", "b", 2)).await.unwrap();

        let page = store
            .query_page(&RecordFilter::project("acme/widgets"), None)
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].identifier.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn query_filters_by_identifier() {
        let store = MemoryStore::new();
        store.create_record(&record("acme/widgets", "a", 1)).await.unwrap();
        store.create_record(&record("acme/widgets", "b", 2)).await.unwrap();

        let page = store
            .query_page(&RecordFilter::identity("acme/widgets", "b"), None)
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);

        assert!(store.record_exists("acme/widgets", "b").await.unwrap());
        assert!(!store.record_exists("acme/widgets", "zzz").await.unwrap());
    }

    #[tokio::test]
    async fn query_paginates_with_cursor() {
        let store = MemoryStore::new();
        for i in 0..(QUERY_PAGE_SIZE + 5) {
            store
                .create_record(&record("acme/widgets", &format!("c{i}"), 1))
                .await
                .unwrap();
        }

        let first = store
            .query_page(&RecordFilter::project("acme/widgets"), None)
            .await
            .unwrap();
        assert_eq!(first.records.len(), QUERY_PAGE_SIZE);
        let cursor = first.next_cursor.expect("expected another page");

        let second = store
            .query_page(&RecordFilter::project("acme/widgets"), Some(cursor))
            .await
            .unwrap();
        assert_eq!(second.records.len(), 5);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn newest_timestamp_returns_max_per_project() {
        let store = MemoryStore::new();
        store.create_record(&record("acme/widgets", "a", 1)).await.unwrap();
        store.create_record(&record("acme/widgets", "b", 9)).await.unwrap();
        store.create_record(&record("acme/gears", "c", 23)).await.unwrap();

        let ts = store.newest_timestamp("acme/widgets").await.unwrap();
        assert_eq!(ts, Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));

        assert_eq!(store.newest_timestamp("acme/nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn identifier_column_can_be_absent_then_added() {
        let store = MemoryStore::without_identifier_field();
        assert_eq!(store.probe_identifier_field().await, FieldProbe::Absent);

        // Records created while the column is absent lose the identifier.
        store.create_record(&record("acme/widgets", "a", 1)).await.unwrap();
        assert!(store.records()[0].identifier.is_none());

        store.add_identifier_field().await.unwrap();
        assert_eq!(store.probe_identifier_field().await, FieldProbe::Present);
    }

    #[tokio::test]
    async fn create_appends_blindly() {
        // Duplicate suppression is the pipeline's job, not the store's.
        let store = MemoryStore::new();
        store.create_record(&record("acme/widgets", "a", 1)).await.unwrap();
        store.create_record(&record("acme/widgets", "a", 1)).await.unwrap();
        assert_eq!(store.len(), 2);
    }
}
