//! Sync coordination across repositories.
//!
//! # Module Structure
//!
//! - [`types`] - `BackfillMode`, `SyncOptions`, `SyncRunStats`, constants
//! - [`progress`] - `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - `SyncEngine`, the chunked fetch-and-write orchestrator
//!
//! # Example
//!
//! ```ignore
//! use scribe::sync::{BackfillMode, SyncEngine};
//!
//! let stats = engine
//!     .sync_repositories(&repos, &BackfillMode::Incremental, None)
//!     .await;
//! println!("{} written, {} skipped", stats.processed, stats.skipped);
//! ```

pub mod engine;
mod progress;
mod types;

// Re-export types
pub use types::{BackfillMode, RepoSyncResult, SyncOptions, SyncRunStats};

// Re-export constants
pub use types::{
    CHUNK_DELAY, FALLBACK_LOOKBACK_DAYS, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_WINDOW_MONTHS,
    MAX_WRITE_RETRIES, OVERLAP_DAYS, REPO_CHUNK_SIZE,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};

// Re-export the engine for convenience
pub use engine::SyncEngine;
