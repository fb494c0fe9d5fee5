//! Shared sync types and constants.

use std::time::Duration;

use crate::ingest::BatchResult;

/// Repositories processed concurrently in one chunk.
pub const REPO_CHUNK_SIZE: usize = 3;

/// Pause between repository chunks.
pub const CHUNK_DELAY: Duration = Duration::from_millis(1000);

/// Backward pad applied to the sync cursor, tolerating out-of-order
/// delivery and timezone skew at the window boundary.
pub const OVERLAP_DAYS: i64 = 1;

/// Look-back window used when a repository has no stored commits yet.
pub const FALLBACK_LOOKBACK_DAYS: i64 = 7;

/// Upper bound on the fixed-window month count.
pub const MAX_WINDOW_MONTHS: u32 = 72;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds when rate limited.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Maximum retries for a single rate-limited operation.
pub const MAX_WRITE_RETRIES: u32 = 5;

/// How far back a backfill run reaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillMode {
    /// Fetch everything since `now - months`, months clamped to
    /// `1..=MAX_WINDOW_MONTHS`.
    FixedWindow {
        /// Number of months to look back.
        months: u32,
    },
    /// Derive the window from the most recent stored commit, padded by
    /// `overlap_days`; fall back to a short fixed window when the
    /// repository has nothing stored yet.
    Incremental,
}

/// Options for a multi-repository sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Repositories processed concurrently per chunk.
    pub chunk_size: usize,
    /// Pause between chunks.
    pub chunk_delay: Duration,
    /// Backward pad on the incremental sync cursor, in days.
    pub overlap_days: i64,
    /// Look-back window when no sync cursor exists, in days.
    pub fallback_lookback_days: i64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            chunk_size: REPO_CHUNK_SIZE,
            chunk_delay: CHUNK_DELAY,
            overlap_days: OVERLAP_DAYS,
            fallback_lookback_days: FALLBACK_LOOKBACK_DAYS,
        }
    }
}

/// Outcome of syncing a single repository.
#[derive(Debug)]
pub struct RepoSyncResult {
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Number of commits fetched from the source.
    pub fetched: usize,
    /// Write outcome for the fetched commits.
    pub result: BatchResult,
    /// Error if the repository sync failed entirely.
    pub error: Option<String>,
}

/// Aggregate statistics for a multi-repository sync run.
///
/// Always populated, even on partial failure, so callers can distinguish
/// "nothing new" from "something failed".
#[derive(Debug, Default)]
pub struct SyncRunStats {
    /// Repositories that completed.
    pub successful: usize,
    /// Repositories that failed entirely.
    pub failed: usize,
    /// Total commits fetched from the source.
    pub fetched: usize,
    /// Total commits newly written.
    pub processed: usize,
    /// Total commits skipped as duplicates.
    pub skipped: usize,
    /// Total write failures.
    pub errors: usize,
    /// Per-repository results in completion order.
    pub results: Vec<RepoSyncResult>,
}

impl SyncRunStats {
    /// Fold one repository result into the aggregate.
    pub fn push(&mut self, result: RepoSyncResult) {
        match result.error {
            Some(_) => self.failed += 1,
            None => self.successful += 1,
        }
        self.fetched += result.fetched;
        self.processed += result.result.processed;
        self.skipped += result.result.skipped;
        self.errors += result.result.errors.len();
        self.results.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_options_default() {
        let options = SyncOptions::default();
        assert_eq!(options.chunk_size, REPO_CHUNK_SIZE);
        assert_eq!(options.overlap_days, OVERLAP_DAYS);
        assert_eq!(options.fallback_lookback_days, FALLBACK_LOOKBACK_DAYS);
    }

    #[test]
    fn stats_aggregate_successes_and_failures() {
        let mut stats = SyncRunStats::default();

        stats.push(RepoSyncResult {
            repository: "acme/widgets".to_string(),
            fetched: 5,
            result: BatchResult {
                processed: 3,
                skipped: 2,
                errors: Vec::new(),
            },
            error: None,
        });
        stats.push(RepoSyncResult {
            repository: "acme/gears".to_string(),
            fetched: 0,
            result: BatchResult::default(),
            error: Some("fetch failed".to_string()),
        });

        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.fetched, 5);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.results.len(), 2);
    }
}
