//! Integration tests for multi-repository sync runs.
//!
//! A stub commit source stands in for the platform API; the store is the
//! in-memory backend. These cover incremental window derivation, the
//! dedup of re-fetched history, and failure isolation across repositories.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use scribe::commit::{CommitRecord, RepoId};
use scribe::dedup::DedupCache;
use scribe::ingest::{BatchWriter, WriteOptions};
use scribe::source::{self, CommitSource, SourceError};
use scribe::store::{MemoryStore, NewRecord, RecordStore};
use scribe::sync::{BackfillMode, ProgressCallback, SyncEngine, SyncOptions};

/// Maximum time any sync run should take in tests.
/// If exceeded, there's likely a hang/deadlock.
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

fn commit(repo: &str, identifier: &str, ts: DateTime<Utc>) -> CommitRecord {
    CommitRecord {
        identifier: identifier.to_string(),
        message: format!("change {identifier}"),
        author_name: "Ada".to_string(),
        author_email: "ada@example.com".to_string(),
        timestamp: ts,
        repository: repo.to_string(),
        url: format!("https://example.com/{repo}/commit/{identifier}"),
    }
}

/// Commit source serving canned history, filtered by the requested window
/// like the real API. Repositories listed in `failing` error out.
#[derive(Default)]
struct StubSource {
    history: HashMap<String, Vec<CommitRecord>>,
    failing: Vec<String>,
}

impl StubSource {
    fn with_history(mut self, repo: &str, commits: Vec<CommitRecord>) -> Self {
        self.history.insert(repo.to_string(), commits);
        self
    }

    fn with_failing(mut self, repo: &str) -> Self {
        self.failing.push(repo.to_string());
        self
    }
}

#[async_trait]
impl CommitSource for StubSource {
    async fn commits_since(
        &self,
        repo: &RepoId,
        since: DateTime<Utc>,
        _on_progress: Option<&ProgressCallback>,
    ) -> source::Result<Vec<CommitRecord>> {
        let full_name = repo.full_name();
        if self.failing.contains(&full_name) {
            return Err(SourceError::Internal("source exploded".to_string()));
        }

        Ok(self
            .history
            .get(&full_name)
            .map(|commits| {
                commits
                    .iter()
                    .filter(|c| c.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn engine_over(store: Arc<MemoryStore>, source: StubSource) -> SyncEngine {
    let dedup = Arc::new(DedupCache::default());
    let writer = BatchWriter::with_options(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        dedup,
        WriteOptions {
            sub_batch_delay: Duration::ZERO,
            ..WriteOptions::default()
        },
    );
    SyncEngine::with_options(
        store,
        Arc::new(source),
        writer,
        SyncOptions {
            chunk_delay: Duration::ZERO,
            ..SyncOptions::default()
        },
    )
}

#[tokio::test]
async fn incremental_sync_dedups_the_overlap_window() {
    // One stored commit at 2024-01-01T10:00:00Z. With a one-day overlap
    // pad the engine fetches from 2023-12-31T10:00:00Z; the source returns
    // the already-stored commit plus one new one.
    let stored_at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    let new_at = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();

    let store = Arc::new(MemoryStore::new());
    store
        .create_record(&NewRecord::from_commit(
            &commit("acme/widgets", "a1", stored_at),
            true,
        ))
        .await
        .unwrap();

    let source = StubSource::default().with_history(
        "acme/widgets",
        vec![
            commit("acme/widgets", "a1", stored_at),
            commit("acme/widgets", "b2", new_at),
        ],
    );
    let engine = engine_over(Arc::clone(&store), source);

    let repos = vec![RepoId::new("acme", "widgets")];
    let stats = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.sync_repositories(&repos, &BackfillMode::Incremental, None),
    )
    .await
    .expect("sync hung");

    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.fetched, 2);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn incremental_sync_without_cursor_uses_short_lookback() {
    let now = Utc::now();
    let recent = now - ChronoDuration::days(2);
    let ancient = now - ChronoDuration::days(400);

    let store = Arc::new(MemoryStore::new());
    let source = StubSource::default().with_history(
        "acme/widgets",
        vec![
            commit("acme/widgets", "recent", recent),
            commit("acme/widgets", "ancient", ancient),
        ],
    );
    let engine = engine_over(Arc::clone(&store), source);

    let repos = vec![RepoId::new("acme", "widgets")];
    let stats = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.sync_repositories(&repos, &BackfillMode::Incremental, None),
    )
    .await
    .expect("sync hung");

    // Only the commit inside the fallback window is fetched; the engine
    // does not scan full history for an empty repository.
    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.processed, 1);
    let records = store.records();
    assert_eq!(records[0].identifier.as_deref(), Some("recent"));
}

#[tokio::test]
async fn fixed_window_reaches_further_back() {
    let now = Utc::now();
    let months_old = now - ChronoDuration::days(80);

    let store = Arc::new(MemoryStore::new());
    let source = StubSource::default().with_history(
        "acme/widgets",
        vec![commit("acme/widgets", "old", months_old)],
    );
    let engine = engine_over(Arc::clone(&store), source);

    let repos = vec![RepoId::new("acme", "widgets")];
    let stats = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.sync_repositories(&repos, &BackfillMode::FixedWindow { months: 6 }, None),
    )
    .await
    .expect("sync hung");

    assert_eq!(stats.processed, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn failing_repository_is_isolated_from_the_rest() {
    let now = Utc::now();
    let fresh = now - ChronoDuration::days(1);

    let store = Arc::new(MemoryStore::new());
    let source = StubSource::default()
        .with_history("acme/a", vec![commit("acme/a", "a1", fresh)])
        .with_failing("acme/b")
        .with_history("acme/c", vec![commit("acme/c", "c1", fresh)]);
    let engine = engine_over(Arc::clone(&store), source);

    let repos = vec![
        RepoId::new("acme", "a"),
        RepoId::new("acme", "b"),
        RepoId::new("acme", "c"),
    ];
    let stats = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.sync_repositories(&repos, &BackfillMode::Incremental, None),
    )
    .await
    .expect("sync hung");

    // A and C completed with their commits; B contributed nothing but the
    // run still returned aggregate counts.
    assert_eq!(stats.successful, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed, 2);
    assert_eq!(store.len(), 2);

    let failure = stats
        .results
        .iter()
        .find(|r| r.error.is_some())
        .expect("expected a failed repo");
    assert_eq!(failure.repository, "acme/b");
    assert_eq!(failure.fetched, 0);
}

#[tokio::test]
async fn rerunning_a_sync_is_idempotent() {
    let now = Utc::now();
    let fresh = now - ChronoDuration::days(1);

    let store = Arc::new(MemoryStore::new());
    let history = vec![
        commit("acme/widgets", "a", fresh),
        commit("acme/widgets", "b", fresh - ChronoDuration::hours(1)),
    ];
    let source = StubSource::default().with_history("acme/widgets", history.clone());
    let engine = engine_over(Arc::clone(&store), source);

    let repos = vec![RepoId::new("acme", "widgets")];
    let first = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.sync_repositories(&repos, &BackfillMode::Incremental, None),
    )
    .await
    .expect("sync hung");
    assert_eq!(first.processed, 2);

    let second = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.sync_repositories(&repos, &BackfillMode::Incremental, None),
    )
    .await
    .expect("sync hung");
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, second.fetched);
    assert_eq!(store.len(), 2);
}
