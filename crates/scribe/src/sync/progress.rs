//! Progress reporting types for ingestion and sync operations.
//!
//! The library never prints; it emits these events through an optional
//! callback and lets the caller decide how to render them.

/// Progress events emitted during sync and batch-write operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting to fetch commits for a repository.
    FetchingCommits {
        /// Repository in `owner/name` form.
        repository: String,
        /// Start of the fetch window (RFC 3339).
        since: String,
    },

    /// Fetched a page of commits.
    FetchedPage {
        /// Repository this page belongs to.
        repository: String,
        /// Page number (1-indexed).
        page: u32,
        /// Number of commits on this page.
        count: usize,
        /// Running total of commits fetched so far.
        total_so_far: usize,
    },

    /// Finished fetching commits for a repository.
    FetchComplete {
        /// Repository that finished fetching.
        repository: String,
        /// Total number of commits fetched.
        total: usize,
    },

    /// Refreshing the dedup cache for a repository.
    RefreshingDedup {
        /// Repository being refreshed.
        repository: String,
        /// True when refreshed unconditionally for a large batch.
        forced: bool,
    },

    /// Dedup state ready for a repository.
    DedupComplete {
        /// Repository the state belongs to.
        repository: String,
        /// Number of known identifiers and fingerprints.
        known: usize,
        /// False when the scan was cut short and duplicates are possible.
        complete: bool,
    },

    /// Starting to write a batch of candidate commits.
    WritingBatch {
        /// Repository being written.
        repository: String,
        /// Candidates that survived the cache check.
        candidates: usize,
        /// Commits skipped as cached duplicates.
        skipped_cached: usize,
    },

    /// One commit written to the store.
    RecordWritten {
        /// Repository the commit belongs to.
        repository: String,
        /// Commit identifier.
        identifier: String,
    },

    /// One commit skipped as a duplicate.
    RecordSkipped {
        /// Repository the commit belongs to.
        repository: String,
        /// Commit identifier.
        identifier: String,
    },

    /// Failed to write one commit.
    WriteError {
        /// Repository the commit belongs to.
        repository: String,
        /// Commit identifier.
        identifier: String,
        /// Error message.
        error: String,
    },

    /// Starting a multi-repository sync run.
    SyncingRepositories {
        /// Number of repositories in the run.
        count: usize,
        /// Repositories processed concurrently per chunk.
        chunk_size: usize,
    },

    /// One repository finished syncing.
    RepoSynced {
        /// Repository that completed.
        repository: String,
        /// Commits fetched from the source.
        fetched: usize,
        /// Commits newly written.
        processed: usize,
        /// Commits skipped as duplicates.
        skipped: usize,
        /// Write failures.
        errors: usize,
    },

    /// One repository failed entirely (fetch error).
    RepoFailed {
        /// Repository that failed.
        repository: String,
        /// Error message.
        error: String,
    },

    /// A multi-repository sync run completed.
    SyncComplete {
        /// Repositories that completed.
        successful: usize,
        /// Repositories that failed.
        failed: usize,
    },

    /// Rate limited, backing off before retry.
    RateLimitBackoff {
        /// What was being retried (repository or operation label).
        context: String,
        /// Time to wait before retry (ms).
        retry_after_ms: u64,
        /// Current attempt number.
        attempt: u32,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
