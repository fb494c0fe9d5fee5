//! Batch-write options and results.

use std::time::Duration;

/// Candidates grouped per sub-batch.
pub const SUB_BATCH_SIZE: usize = 10;

/// Writes in flight simultaneously within a sub-batch.
pub const WRITE_CONCURRENCY: usize = 5;

/// Pause between sub-batches, keeping sustained write volume under the
/// store's rate limit.
pub const SUB_BATCH_DELAY: Duration = Duration::from_millis(350);

/// Batches at or above this size force a dedup cache refresh before
/// partitioning, avoiding stale-cache false negatives.
pub const FORCE_REFRESH_THRESHOLD: usize = 100;

/// Tuning knobs for the batch writer.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Candidates grouped per sub-batch.
    pub sub_batch_size: usize,
    /// Concurrent writes within a sub-batch.
    pub write_concurrency: usize,
    /// Pause between sub-batches.
    pub sub_batch_delay: Duration,
    /// Batch size that forces a dedup refresh.
    pub force_refresh_threshold: usize,
    /// Skip the legacy fingerprint scan when the destination schema carries
    /// identifiers, trading a small dedup-accuracy risk for throughput on
    /// large backfills.
    pub skip_legacy_scan: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sub_batch_size: SUB_BATCH_SIZE,
            write_concurrency: WRITE_CONCURRENCY,
            sub_batch_delay: SUB_BATCH_DELAY,
            force_refresh_threshold: FORCE_REFRESH_THRESHOLD,
            skip_legacy_scan: false,
        }
    }
}

/// Outcome of processing a batch of commits.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Commits newly written.
    pub processed: usize,
    /// Commits skipped as duplicates.
    pub skipped: usize,
    /// Write failures (non-fatal, the batch continues).
    pub errors: Vec<String>,
}

impl BatchResult {
    /// Fold another result into this one.
    pub fn merge(&mut self, other: BatchResult) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}
