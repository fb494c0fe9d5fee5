//! Backfill source adapter.
//!
//! Produces normalized [`CommitRecord`]s for a repository and time window by
//! paginating the source system's history. Webhook and backfill commits end
//! up in the same shape, so the rest of the pipeline is origin-agnostic.

mod github;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::commit::{CommitRecord, RepoId};
use crate::sync::ProgressCallback;

pub use github::{COMMIT_PAGE_SIZE, GitHubSource, PAGE_DELAY};

/// Errors that can occur when fetching commit history.
#[derive(Debug, Error)]
pub enum SourceError {
    /// API error from the source platform.
    #[error("Source API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Repository not found (or not visible to the token).
    #[error("Repository not found: {0}")]
    NotFound(String),

    /// Unexpected/internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Check if an error indicates a rate limit (403/429 or JSON parse error
/// from an empty response).
pub fn is_rate_limit_error(e: &octocrab::Error) -> bool {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            status == 403 || status == 429
        }
        // Empty response body (EOF) often indicates rate limiting
        octocrab::Error::Json { .. } => true,
        _ => false,
    }
}

impl SourceError {
    /// Check if this error indicates rate limiting (retryable).
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Api(e) => is_rate_limit_error(e),
            _ => false,
        }
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// A paginated source of commit history.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Fetch all commits authored since `since`, oldest pagination order the
    /// source provides, normalized into [`CommitRecord`]s.
    async fn commits_since(
        &self,
        repo: &RepoId,
        since: DateTime<Utc>,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<CommitRecord>>;
}
