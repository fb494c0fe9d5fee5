//! Batch writer: filters known duplicates and writes the rest under bounded
//! concurrency.
//!
//! The writer trusts the dedup cache only as a first pass. Immediately
//! before each write it re-checks existence against the store, which closes
//! the race window between cache population and write — the webhook and
//! backfill paths can target the same repository concurrently.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::commit::{CommitRecord, RepoId};
use crate::dedup::{DedupCache, IdentifierSupport};
use crate::store::{NewRecord, RecordStore};
use crate::sync::{ProgressCallback, SyncProgress, emit};

use super::types::{BatchResult, WriteOptions};

/// Writes normalized commits into the record store, deduplicating against
/// the cache and the store itself.
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn RecordStore>,
    dedup: Arc<DedupCache>,
    options: WriteOptions,
}

/// Per-commit write outcome, settled inside the worker task.
enum WriteOutcome {
    Written,
    Skipped,
    Failed(String),
}

impl BatchWriter {
    /// Create a writer with default options.
    pub fn new(store: Arc<dyn RecordStore>, dedup: Arc<DedupCache>) -> Self {
        Self::with_options(store, dedup, WriteOptions::default())
    }

    /// Create a writer with custom options.
    pub fn with_options(
        store: Arc<dyn RecordStore>,
        dedup: Arc<DedupCache>,
        options: WriteOptions,
    ) -> Self {
        Self {
            store,
            dedup,
            options,
        }
    }

    /// The store this writer targets.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Write a batch of commits for one repository.
    ///
    /// Commits already present (by identifier, legacy fingerprint, or
    /// duplicated within the batch itself) are counted as skipped. Write
    /// failures are counted and the batch continues; nothing here aborts.
    #[tracing::instrument(skip(self, commits, on_progress), fields(repository = %repo, count = commits.len()))]
    pub async fn write(
        &self,
        repo: &RepoId,
        commits: Vec<CommitRecord>,
        on_progress: Option<&ProgressCallback>,
    ) -> BatchResult {
        let mut result = BatchResult::default();
        if commits.is_empty() {
            return result;
        }

        let project = repo.full_name();

        let support = self.dedup.identifier_support(self.store.as_ref()).await;
        let identifier_column = support == IdentifierSupport::Supported;
        // The fingerprint scan can only be skipped when every row is
        // coverable by an identifier lookup.
        let scan_legacy = !identifier_column || !self.options.skip_legacy_scan;

        let forced = commits.len() >= self.options.force_refresh_threshold;
        emit(
            on_progress,
            SyncProgress::RefreshingDedup {
                repository: project.clone(),
                forced,
            },
        );

        let known = if forced {
            self.dedup
                .refresh(self.store.as_ref(), &project, scan_legacy)
                .await
        } else {
            self.dedup
                .known_state(self.store.as_ref(), &project, scan_legacy)
                .await
        };

        emit(
            on_progress,
            SyncProgress::DedupComplete {
                repository: project.clone(),
                known: known.known_count(),
                complete: known.complete,
            },
        );

        // First pass: partition against the warm cache.
        let mut candidates = Vec::new();
        let mut seen_in_batch = HashSet::new();
        for commit in commits {
            if known.contains(&commit) || !seen_in_batch.insert(commit.identifier.clone()) {
                result.skipped += 1;
                emit(
                    on_progress,
                    SyncProgress::RecordSkipped {
                        repository: project.clone(),
                        identifier: commit.identifier,
                    },
                );
            } else {
                candidates.push(commit);
            }
        }

        emit(
            on_progress,
            SyncProgress::WritingBatch {
                repository: project.clone(),
                candidates: candidates.len(),
                skipped_cached: result.skipped,
            },
        );

        if candidates.is_empty() {
            return result;
        }

        let total_batches = candidates.len().div_ceil(self.options.sub_batch_size);
        let chunks: Vec<Vec<CommitRecord>> = candidates
            .chunks(self.options.sub_batch_size)
            .map(<[CommitRecord]>::to_vec)
            .collect();

        for (index, chunk) in chunks.into_iter().enumerate() {
            let sub_result = self
                .write_sub_batch(chunk, identifier_column, &project, on_progress)
                .await;
            result.merge(sub_result);

            if index + 1 < total_batches {
                tokio::time::sleep(self.options.sub_batch_delay).await;
            }
        }

        tracing::info!(
            repository = %project,
            processed = result.processed,
            skipped = result.skipped,
            errors = result.errors.len(),
            "Batch written"
        );

        result
    }

    /// Write one sub-batch with a bounded number of writes in flight.
    async fn write_sub_batch(
        &self,
        commits: Vec<CommitRecord>,
        identifier_column: bool,
        project: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> BatchResult {
        let concurrency = std::cmp::min(self.options.write_concurrency, commits.len());
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let mut handles = Vec::with_capacity(commits.len());
        for commit in commits {
            let store = Arc::clone(&self.store);
            let dedup = Arc::clone(&self.dedup);
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let outcome =
                            WriteOutcome::Failed("Semaphore closed unexpectedly".to_string());
                        return (commit, outcome);
                    }
                };

                let outcome =
                    write_one(store.as_ref(), &dedup, &commit, identifier_column).await;
                (commit, outcome)
            });

            handles.push(handle);
        }

        let mut result = BatchResult::default();
        for handle in handles {
            match handle.await {
                Ok((commit, WriteOutcome::Written)) => {
                    result.processed += 1;
                    emit(
                        on_progress,
                        SyncProgress::RecordWritten {
                            repository: project.to_string(),
                            identifier: commit.identifier,
                        },
                    );
                }
                Ok((commit, WriteOutcome::Skipped)) => {
                    result.skipped += 1;
                    emit(
                        on_progress,
                        SyncProgress::RecordSkipped {
                            repository: project.to_string(),
                            identifier: commit.identifier,
                        },
                    );
                }
                Ok((commit, WriteOutcome::Failed(error))) => {
                    result
                        .errors
                        .push(format!("{}: {}", commit.identifier, error));
                    emit(
                        on_progress,
                        SyncProgress::WriteError {
                            repository: project.to_string(),
                            identifier: commit.identifier,
                            error,
                        },
                    );
                }
                Err(e) => {
                    result.errors.push(format!("Task panic: {e}"));
                }
            }
        }

        result
    }
}

/// Race-guard check and write for a single commit.
async fn write_one(
    store: &dyn RecordStore,
    dedup: &DedupCache,
    commit: &CommitRecord,
    identifier_column: bool,
) -> WriteOutcome {
    // One more existence check immediately before writing. Only possible
    // when the store can be queried by identifier.
    if identifier_column {
        match store
            .record_exists(&commit.repository, &commit.identifier)
            .await
        {
            Ok(true) => {
                dedup
                    .note_written(&commit.repository, &commit.identifier, &commit.fingerprint())
                    .await;
                return WriteOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                // Writing blind after a failed guard risks a duplicate;
                // upstream is the system of record and can re-deliver.
                return WriteOutcome::Failed(format!("existence check failed: {e}"));
            }
        }
    }

    let record = NewRecord::from_commit(commit, identifier_column);
    match store.create_record(&record).await {
        Ok(()) => {
            dedup
                .note_written(&commit.repository, &commit.identifier, &commit.fingerprint())
                .await;
            WriteOutcome::Written
        }
        Err(e) if e.is_conflict() => {
            dedup
                .note_written(&commit.repository, &commit.identifier, &commit.fingerprint())
                .await;
            WriteOutcome::Skipped
        }
        Err(e) => WriteOutcome::Failed(e.to_string()),
    }
}
