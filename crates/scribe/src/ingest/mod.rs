//! Commit ingestion: dedup-aware batch writing.
//!
//! # Module Structure
//!
//! - [`types`] - `BatchResult`, `WriteOptions`, constants
//! - [`writer`] - `BatchWriter`, the race-guarded write loop

mod types;
mod writer;

pub use types::{
    BatchResult, FORCE_REFRESH_THRESHOLD, SUB_BATCH_DELAY, SUB_BATCH_SIZE, WRITE_CONCURRENCY,
    WriteOptions,
};
pub use writer::BatchWriter;
