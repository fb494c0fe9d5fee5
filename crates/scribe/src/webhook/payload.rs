//! Push event wire format.
//!
//! One event is one push and carries zero or more commits. The wire shape
//! is fixed serde structs with an explicit conversion into the shared
//! [`CommitRecord`] form.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::commit::CommitRecord;

/// An inbound push notification.
#[derive(Debug, Deserialize)]
pub struct PushEvent {
    /// The repository the push targeted.
    pub repository: EventRepository,
    /// Commits contained in the push. May be empty (tag pushes).
    #[serde(default)]
    pub commits: Vec<EventCommit>,
}

/// Repository section of a push event.
#[derive(Debug, Deserialize)]
pub struct EventRepository {
    /// Repository in `owner/name` form.
    pub full_name: String,
}

/// One commit inside a push event.
#[derive(Debug, Deserialize)]
pub struct EventCommit {
    /// Source revision id.
    pub id: String,
    /// Commit message.
    pub message: String,
    /// When the change was authored. Offsets are normalized to UTC.
    pub timestamp: DateTime<Utc>,
    /// Canonical link to the commit.
    pub url: String,
    /// Author of the change.
    pub author: EventAuthor,
}

/// Author section of a push-event commit.
#[derive(Debug, Deserialize)]
pub struct EventAuthor {
    /// Display name.
    pub name: String,
    /// Contact address, if provided.
    #[serde(default)]
    pub email: Option<String>,
}

impl PushEvent {
    /// Convert the event's commits into the shared normalized shape.
    #[must_use]
    pub fn into_commits(self) -> Vec<CommitRecord> {
        let repository = self.repository.full_name;
        self.commits
            .into_iter()
            .map(|commit| CommitRecord {
                identifier: commit.id,
                message: commit.message,
                author_name: commit.author.name,
                author_email: commit.author.email.unwrap_or_default(),
                timestamp: commit.timestamp,
                repository: repository.clone(),
                url: commit.url,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> serde_json::Value {
        serde_json::json!({
            "repository": { "full_name": "acme/widgets" },
            "commits": [
                {
                    "id": "abc123",
                    "message": "fix the widget",
                    "timestamp": "2024-01-01T12:00:00+02:00",
                    "url": "https://example.com/acme/widgets/commit/abc123",
                    "author": { "name": "Ada", "email": "ada@example.com" }
                },
                {
                    "id": "def456",
                    "message": "add gears",
                    "timestamp": "2024-01-02T09:00:00Z",
                    "url": "https://example.com/acme/widgets/commit/def456",
                    "author": { "name": "Grace" }
                }
            ]
        })
    }

    #[test]
    fn event_deserializes_and_converts() {
        let event: PushEvent = serde_json::from_value(sample_event()).unwrap();
        assert_eq!(event.repository.full_name, "acme/widgets");

        let commits = event.into_commits();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].identifier, "abc123");
        assert_eq!(commits[0].repository, "acme/widgets");
        // Offset timestamps are normalized to UTC.
        assert_eq!(commits[0].timestamp.to_rfc3339(), "2024-01-01T10:00:00+00:00");
        // Missing email becomes an empty contact string.
        assert_eq!(commits[1].author_email, "");
    }

    #[test]
    fn event_without_commits_is_valid() {
        let event: PushEvent = serde_json::from_value(serde_json::json!({
            "repository": { "full_name": "acme/widgets" }
        }))
        .unwrap();
        assert!(event.into_commits().is_empty());
    }

    #[test]
    fn event_without_repository_is_rejected() {
        let result: Result<PushEvent, _> =
            serde_json::from_value(serde_json::json!({ "commits": [] }));
        assert!(result.is_err());
    }
}
