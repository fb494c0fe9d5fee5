//! Scribe - mirrors a source-control activity stream into an external
//! record store.
//!
//! The library receives commit events via push notification
//! ([`webhook`]) or pull-based backfill ([`source`]), determines which
//! commits are already mirrored ([`dedup`]), writes only the missing ones
//! under bounded concurrency and rate limits ([`ingest`]), and tracks
//! per-repository sync progress so future runs are incremental ([`sync`]).
//!
//! Upstream delivery is at-least-once; the write side is idempotent. The
//! dedup cache is advisory — the per-write existence check in the batch
//! writer is the correctness guarantee, so every cache failure degrades to
//! "know less", never to an error.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scribe::{BatchWriter, DedupCache, GitHubSource, HttpRecordStore, SyncEngine};
//! use scribe::sync::BackfillMode;
//!
//! let store = Arc::new(HttpRecordStore::new(store_config)?);
//! let dedup = Arc::new(DedupCache::default());
//! let writer = BatchWriter::new(store.clone(), dedup);
//! let source = Arc::new(GitHubSource::new(&github_token)?);
//!
//! let engine = SyncEngine::new(store, source, writer);
//! let stats = engine
//!     .sync_repositories(&repos, &BackfillMode::Incremental, None)
//!     .await;
//! println!("{} written, {} skipped", stats.processed, stats.skipped);
//! ```

pub mod commit;
pub mod dedup;
pub mod ingest;
pub mod rate_limit;
pub mod retry;
pub mod source;
pub mod store;
pub mod sync;
pub mod webhook;

pub use commit::{CommitRecord, RepoId};
pub use dedup::{DedupCache, DedupConfig, IdentifierSupport, KnownState};
pub use ingest::{BatchResult, BatchWriter, WriteOptions};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use source::{CommitSource, GitHubSource, SourceError};
pub use store::{HttpRecordStore, MemoryStore, RecordStore, StoreConfig, StoreError};
pub use sync::{BackfillMode, SyncEngine, SyncOptions, SyncRunStats};
