//! GitHub commit history adapter.
//!
//! Pages through `/repos/{owner}/{name}/commits` with typed wire structs
//! until a page comes back short, pacing page fetches and retrying
//! rate-limited requests with backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use octocrab::Octocrab;
use serde::Deserialize;

use crate::commit::{CommitRecord, RepoId};
use crate::retry::with_retry;
use crate::sync::{ProgressCallback, SyncProgress, emit};

use super::{CommitSource, Result, SourceError};

/// Commits requested per page.
pub const COMMIT_PAGE_SIZE: usize = 100;

/// Pause between page fetches.
pub const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Commit source backed by the GitHub REST API.
#[derive(Clone)]
pub struct GitHubSource {
    inner: Arc<Octocrab>,
    page_delay: Duration,
}

impl GitHubSource {
    /// Create an authenticated source from a GitHub token.
    pub fn new(token: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(SourceError::Api)?;

        Ok(Self {
            inner: Arc::new(client),
            page_delay: PAGE_DELAY,
        })
    }

    /// Override the inter-page delay.
    #[must_use]
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    async fn fetch_page(
        &self,
        repo: &RepoId,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<Vec<CommitPayload>> {
        let route = format!(
            "/repos/{}/{}/commits?since={}&per_page={}&page={}",
            repo.owner,
            repo.name,
            since.to_rfc3339_opts(SecondsFormat::Secs, true),
            COMMIT_PAGE_SIZE,
            page
        );

        self.inner
            .get(route, None::<&()>)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. }
                    if source.status_code.as_u16() == 404 =>
                {
                    SourceError::NotFound(repo.full_name())
                }
                _ => SourceError::Api(e),
            })
    }
}

#[async_trait]
impl CommitSource for GitHubSource {
    #[tracing::instrument(skip(self, on_progress), fields(repository = %repo))]
    async fn commits_since(
        &self,
        repo: &RepoId,
        since: DateTime<Utc>,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<CommitRecord>> {
        let repository = repo.full_name();
        let mut commits = Vec::new();
        let mut page: u32 = 1;

        emit(
            on_progress,
            SyncProgress::FetchingCommits {
                repository: repository.clone(),
                since: since.to_rfc3339(),
            },
        );

        loop {
            let payload = with_retry(
                || self.fetch_page(repo, since, page),
                SourceError::is_rate_limited,
                &repository,
                on_progress,
            )
            .await?;

            let count = payload.len();
            for item in payload {
                match into_commit_record(item, repo) {
                    Some(commit) => commits.push(commit),
                    None => {
                        emit(
                            on_progress,
                            SyncProgress::Warning {
                                message: format!(
                                    "{repository}: skipped a commit without a usable timestamp"
                                ),
                            },
                        );
                    }
                }
            }

            emit(
                on_progress,
                SyncProgress::FetchedPage {
                    repository: repository.clone(),
                    page,
                    count,
                    total_so_far: commits.len(),
                },
            );

            // A short page is the last page.
            if count < COMMIT_PAGE_SIZE {
                break;
            }
            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        emit(
            on_progress,
            SyncProgress::FetchComplete {
                repository,
                total: commits.len(),
            },
        );

        Ok(commits)
    }
}

// ---------- Wire format ----------

#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
    commit: CommitDetail,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    #[serde(default)]
    author: Option<CommitSignature>,
    #[serde(default)]
    committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

/// Normalize one wire commit into the shared [`CommitRecord`] shape.
///
/// Returns `None` when neither signature carries a timestamp; such a commit
/// can be represented by neither the legacy fingerprint nor the sync
/// cursor.
fn into_commit_record(payload: CommitPayload, repo: &RepoId) -> Option<CommitRecord> {
    let CommitPayload {
        sha,
        commit,
        html_url,
    } = payload;

    let timestamp = commit
        .author
        .as_ref()
        .and_then(|a| a.date)
        .or_else(|| commit.committer.as_ref().and_then(|c| c.date));
    let Some(timestamp) = timestamp else {
        tracing::warn!(sha = %sha, repository = %repo, "Skipping commit without timestamp");
        return None;
    };

    let signature = commit.author.or(commit.committer);
    let (author_name, author_email) = match signature {
        Some(sig) => (
            sig.name.unwrap_or_else(|| "unknown".to_string()),
            sig.email.unwrap_or_default(),
        ),
        None => ("unknown".to_string(), String::new()),
    };

    Some(CommitRecord {
        identifier: sha,
        message: commit.message,
        author_name,
        author_email,
        timestamp,
        repository: repo.full_name(),
        url: html_url,
    })
}
