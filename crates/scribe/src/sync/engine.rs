//! Multi-repository sync orchestration.
//!
//! Repositories are processed in bounded chunks; within a chunk each
//! repository runs on its own task and every task is settled before the
//! next chunk starts, so one repository's failure never cancels another's
//! work.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::commit::RepoId;
use crate::ingest::{BatchResult, BatchWriter};
use crate::source::CommitSource;
use crate::store::RecordStore;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{BackfillMode, MAX_WINDOW_MONTHS, RepoSyncResult, SyncOptions, SyncRunStats};

/// Orchestrates backfill fetches and batch writes across repositories.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn CommitSource>,
    writer: BatchWriter,
    options: SyncOptions,
}

impl SyncEngine {
    /// Create an engine with default options.
    pub fn new(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn CommitSource>,
        writer: BatchWriter,
    ) -> Self {
        Self::with_options(store, source, writer, SyncOptions::default())
    }

    /// Create an engine with custom options.
    pub fn with_options(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn CommitSource>,
        writer: BatchWriter,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            source,
            writer,
            options,
        }
    }

    /// Sync many repositories with bounded parallelism.
    ///
    /// Failures are isolated per repository: a failed fetch contributes
    /// zero commits and an error entry to the aggregate, nothing more.
    #[tracing::instrument(skip_all, fields(repo_count = repos.len()))]
    pub async fn sync_repositories(
        &self,
        repos: &[RepoId],
        mode: &BackfillMode,
        on_progress: Option<&ProgressCallback>,
    ) -> SyncRunStats {
        let mut stats = SyncRunStats::default();
        if repos.is_empty() {
            return stats;
        }

        let chunk_size = std::cmp::max(1, self.options.chunk_size);
        emit(
            on_progress,
            SyncProgress::SyncingRepositories {
                count: repos.len(),
                chunk_size,
            },
        );

        let total_chunks = repos.len().div_ceil(chunk_size);
        for (index, chunk) in repos.chunks(chunk_size).enumerate() {
            let mut handles = Vec::with_capacity(chunk.len());
            for repo in chunk {
                let engine = self.clone();
                let repo = repo.clone();
                let mode = mode.clone();

                handles.push(tokio::spawn(async move {
                    engine.sync_repository(&repo, &mode, None).await
                }));
            }

            // Settle every repository in the chunk, failures included.
            for handle in handles {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => RepoSyncResult {
                        repository: "<unknown>".to_string(),
                        fetched: 0,
                        result: BatchResult::default(),
                        error: Some(format!("Task panic: {e}")),
                    },
                };

                match &result.error {
                    Some(error) => emit(
                        on_progress,
                        SyncProgress::RepoFailed {
                            repository: result.repository.clone(),
                            error: error.clone(),
                        },
                    ),
                    None => emit(
                        on_progress,
                        SyncProgress::RepoSynced {
                            repository: result.repository.clone(),
                            fetched: result.fetched,
                            processed: result.result.processed,
                            skipped: result.result.skipped,
                            errors: result.result.errors.len(),
                        },
                    ),
                }

                stats.push(result);
            }

            if index + 1 < total_chunks {
                tokio::time::sleep(self.options.chunk_delay).await;
            }
        }

        emit(
            on_progress,
            SyncProgress::SyncComplete {
                successful: stats.successful,
                failed: stats.failed,
            },
        );

        stats
    }

    /// Sync one repository: compute the window, fetch, write.
    #[tracing::instrument(skip(self, on_progress), fields(repository = %repo))]
    pub async fn sync_repository(
        &self,
        repo: &RepoId,
        mode: &BackfillMode,
        on_progress: Option<&ProgressCallback>,
    ) -> RepoSyncResult {
        let repository = repo.full_name();
        let since = self.window_start(&repository, mode).await;

        let commits = match self.source.commits_since(repo, since, on_progress).await {
            Ok(commits) => commits,
            Err(e) => {
                tracing::warn!(repository = %repository, error = %e, "Repository fetch failed");
                return RepoSyncResult {
                    repository,
                    fetched: 0,
                    result: BatchResult::default(),
                    error: Some(e.to_string()),
                };
            }
        };

        let fetched = commits.len();
        let result = self.writer.write(repo, commits, on_progress).await;

        RepoSyncResult {
            repository,
            fetched,
            result,
            error: None,
        }
    }

    /// Compute the start of the fetch window for a repository.
    async fn window_start(&self, project: &str, mode: &BackfillMode) -> DateTime<Utc> {
        match mode {
            BackfillMode::FixedWindow { months } => {
                let months = (*months).clamp(1, MAX_WINDOW_MONTHS);
                Utc::now() - ChronoDuration::days(30 * i64::from(months))
            }
            BackfillMode::Incremental => match self.store.newest_timestamp(project).await {
                Ok(Some(cursor)) => cursor - ChronoDuration::days(self.options.overlap_days),
                Ok(None) => {
                    Utc::now() - ChronoDuration::days(self.options.fallback_lookback_days)
                }
                Err(e) => {
                    tracing::warn!(
                        project,
                        error = %e,
                        "Sync cursor query failed; using fallback window"
                    );
                    Utc::now() - ChronoDuration::days(self.options.fallback_lookback_days)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::commit::CommitRecord;
    use crate::dedup::DedupCache;
    use crate::source::{self, SourceError};
    use crate::store::{MemoryStore, NewRecord};
    use crate::sync::{FALLBACK_LOOKBACK_DAYS, OVERLAP_DAYS};

    /// Source that returns nothing and remembers the windows it was asked
    /// for.
    #[derive(Default)]
    struct RecordingSource {
        windows: std::sync::Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl CommitSource for RecordingSource {
        async fn commits_since(
            &self,
            _repo: &RepoId,
            since: DateTime<Utc>,
            _on_progress: Option<&ProgressCallback>,
        ) -> source::Result<Vec<CommitRecord>> {
            self.windows
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(since);
            Ok(Vec::new())
        }
    }

    fn engine_with(store: Arc<MemoryStore>, source: Arc<RecordingSource>) -> SyncEngine {
        let dedup = Arc::new(DedupCache::default());
        let writer = BatchWriter::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            dedup,
        );
        SyncEngine::with_options(
            store,
            source,
            writer,
            SyncOptions {
                chunk_delay: std::time::Duration::ZERO,
                ..SyncOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn incremental_without_cursor_uses_fallback_window() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(RecordingSource::default());
        let engine = engine_with(Arc::clone(&store), Arc::clone(&source));

        let repo = RepoId::new("acme", "widgets");
        engine
            .sync_repository(&repo, &BackfillMode::Incremental, None)
            .await;

        let windows = source.windows.lock().unwrap();
        let expected = Utc::now() - ChronoDuration::days(FALLBACK_LOOKBACK_DAYS);
        let delta = (windows[0] - expected).num_seconds().abs();
        assert!(delta < 5, "fallback window off by {delta}s");
    }

    #[tokio::test]
    async fn incremental_pads_the_stored_cursor() {
        let store = Arc::new(MemoryStore::new());
        let cursor = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        store
            .create_record(&NewRecord {
                project: "acme/widgets".to_string(),
                identifier: Some("a".to_string()),
                message: "stored".to_string(),
                committed_at: cursor,
                url: "https://example.com/c/a".to_string(),
            })
            .await
            .unwrap();

        let source = Arc::new(RecordingSource::default());
        let engine = engine_with(Arc::clone(&store), Arc::clone(&source));

        let repo = RepoId::new("acme", "widgets");
        engine
            .sync_repository(&repo, &BackfillMode::Incremental, None)
            .await;

        let windows = source.windows.lock().unwrap();
        assert_eq!(windows[0], cursor - ChronoDuration::days(OVERLAP_DAYS));
    }

    #[tokio::test]
    async fn fixed_window_clamps_month_count() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(RecordingSource::default());
        let engine = engine_with(Arc::clone(&store), Arc::clone(&source));

        let repo = RepoId::new("acme", "widgets");
        engine
            .sync_repository(&repo, &BackfillMode::FixedWindow { months: 10_000 }, None)
            .await;

        let windows = source.windows.lock().unwrap();
        let expected = Utc::now() - ChronoDuration::days(30 * i64::from(MAX_WINDOW_MONTHS));
        let delta = (windows[0] - expected).num_seconds().abs();
        assert!(delta < 5, "clamped window off by {delta}s");
    }

    #[tokio::test]
    async fn empty_repo_list_returns_default_stats() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(RecordingSource::default());
        let engine = engine_with(store, source);

        let stats = engine
            .sync_repositories(&[], &BackfillMode::Incremental, None)
            .await;
        assert_eq!(stats.successful, 0);
        assert_eq!(stats.failed, 0);
        assert!(stats.results.is_empty());
    }

    /// Source that fails for one repository and returns nothing otherwise.
    struct FailingFor(&'static str);

    #[async_trait]
    impl CommitSource for FailingFor {
        async fn commits_since(
            &self,
            repo: &RepoId,
            _since: DateTime<Utc>,
            _on_progress: Option<&ProgressCallback>,
        ) -> source::Result<Vec<CommitRecord>> {
            if repo.full_name() == self.0 {
                Err(SourceError::Internal("boom".to_string()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[tokio::test]
    async fn one_failing_repo_does_not_sink_the_chunk() {
        let store = Arc::new(MemoryStore::new());
        let dedup = Arc::new(DedupCache::default());
        let writer = BatchWriter::new(Arc::clone(&store) as Arc<dyn RecordStore>, dedup);
        let engine = SyncEngine::with_options(
            store,
            Arc::new(FailingFor("acme/b")),
            writer,
            SyncOptions {
                chunk_delay: std::time::Duration::ZERO,
                ..SyncOptions::default()
            },
        );

        let repos = vec![
            RepoId::new("acme", "a"),
            RepoId::new("acme", "b"),
            RepoId::new("acme", "c"),
        ];
        let stats = engine
            .sync_repositories(&repos, &BackfillMode::Incremental, None)
            .await;

        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        let failed: Vec<_> = stats
            .results
            .iter()
            .filter(|r| r.error.is_some())
            .map(|r| r.repository.as_str())
            .collect();
        assert_eq!(failed, vec!["acme/b"]);
    }
}
