//! Core commit types shared by every ingestion path.
//!
//! A [`CommitRecord`] is the normalized representation of one source-control
//! change. Webhook payloads and backfill pages are both converted into this
//! shape, so the dedup cache and batch writer never care where a commit
//! came from.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Maximum number of characters the destination store accepts for a commit
/// message. Longer messages are truncated with a visible marker.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Marker appended to truncated messages.
pub const TRUNCATION_MARKER: char = '…';

/// A repository identity in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    /// Repository owner (user or org).
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoId {
    /// Create a repo id from owner and name parts.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Get the full name (owner/name).
    #[inline]
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Error returned when a repository string is not in `owner/name` form.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid repository '{input}', expected owner/name")]
pub struct InvalidRepoId {
    /// The string that failed to parse.
    pub input: String,
}

impl FromStr for RepoId {
    type Err = InvalidRepoId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(owner, name))
            }
            _ => Err(InvalidRepoId {
                input: s.to_string(),
            }),
        }
    }
}

/// Normalized representation of one source-control change, origin-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Stable unique revision id within the repository.
    pub identifier: String,
    /// Commit message as authored. Truncation happens at the storage
    /// boundary, not here.
    pub message: String,
    /// Author display name.
    pub author_name: String,
    /// Author contact address.
    pub author_email: String,
    /// When the change was authored (not received).
    pub timestamp: DateTime<Utc>,
    /// Owning repository in `owner/name` form.
    pub repository: String,
    /// Canonical link back to the source system.
    pub url: String,
}

impl CommitRecord {
    /// Legacy dedup key used when the destination schema has no identifier
    /// column: the stored message plus the authored timestamp.
    ///
    /// Computed over the truncated message so it matches fingerprints
    /// rebuilt from store rows.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        legacy_fingerprint(&truncate_message(&self.message), self.timestamp)
    }
}

/// Build a legacy `message|timestamp` fingerprint from stored fields.
#[must_use]
pub fn legacy_fingerprint(stored_message: &str, timestamp: DateTime<Utc>) -> String {
    format!("{}|{}", stored_message, timestamp.to_rfc3339())
}

/// Truncate a commit message to the destination's field limit.
///
/// A message of exactly [`MAX_MESSAGE_LEN`] characters is returned
/// unmodified; anything longer keeps `MAX_MESSAGE_LEN - 1` characters and
/// gains a [`TRUNCATION_MARKER`], so the result never exceeds the limit.
#[must_use]
pub fn truncate_message(message: &str) -> String {
    // chars, not bytes: the store limit is a character count.
    if message.chars().count() <= MAX_MESSAGE_LEN {
        return message.to_string();
    }

    let mut truncated: String = message.chars().take(MAX_MESSAGE_LEN - 1).collect();
    truncated.push(TRUNCATION_MARKER);
    truncated
}
