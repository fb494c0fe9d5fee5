//! Push event receiver.
//!
//! Validates the event signature over the raw request bytes, acknowledges
//! immediately, and hands the commits to the batch writer on a background
//! task. The inbound transport is never blocked waiting on the write path:
//! the event source's delivery timeout is decoupled from store latency.
//!
//! The receiver never retries on its own. If the asynchronous write exceeds
//! its timeout the attempt is abandoned and logged; the event source is the
//! system of record and a later backfill recovers anything lost.

mod payload;
mod signature;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::commit::RepoId;
use crate::ingest::BatchWriter;

pub use payload::{EventAuthor, EventCommit, EventRepository, PushEvent};
pub use signature::{SIGNATURE_HEADER, SignatureError, sign_payload, verify_signature};

/// How long the background write path may run before it is abandoned.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur while running the receiver.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Failed to bind the listen address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The server stopped with an error.
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared state for the push handler.
#[derive(Clone)]
pub struct WebhookState {
    secret: Arc<String>,
    writer: Arc<BatchWriter>,
    write_timeout: Duration,
}

impl WebhookState {
    /// Create handler state from the shared secret and a batch writer.
    pub fn new(secret: impl Into<String>, writer: Arc<BatchWriter>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            writer,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Override the background write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Build the receiver router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", post(handle_push))
        .with_state(state)
}

/// Bind `addr` and serve the receiver until the process stops.
pub async fn serve(addr: SocketAddr, state: WebhookState) -> Result<(), WebhookError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| WebhookError::Bind { addr, source })?;
    tracing::info!(%addr, "Webhook receiver listening");
    serve_on(listener, state).await
}

/// Serve the receiver on an already-bound listener.
pub async fn serve_on(listener: TcpListener, state: WebhookState) -> Result<(), WebhookError> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Handle one push notification.
async fn handle_push(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => {
            tracing::warn!("Rejected event: missing signature header");
            return StatusCode::UNAUTHORIZED;
        }
    };

    if let Err(e) = verify_signature(&state.secret, &body, header) {
        tracing::warn!(error = %e, "Rejected event: signature verification failed");
        return StatusCode::UNAUTHORIZED;
    }

    let event: PushEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected event: undecodable payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    let repo: RepoId = match event.repository.full_name.parse() {
        Ok(repo) => repo,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected event: invalid repository");
            return StatusCode::BAD_REQUEST;
        }
    };

    let commits = event.into_commits();
    if commits.is_empty() {
        return StatusCode::ACCEPTED;
    }

    // Acknowledge now; the write happens behind the response.
    let writer = Arc::clone(&state.writer);
    let timeout = state.write_timeout;
    tokio::spawn(async move {
        let received = commits.len();
        match tokio::time::timeout(timeout, writer.write(&repo, commits, None)).await {
            Ok(result) => {
                tracing::info!(
                    repository = %repo,
                    received,
                    processed = result.processed,
                    skipped = result.skipped,
                    errors = result.errors.len(),
                    "Webhook batch written"
                );
            }
            Err(_) => {
                tracing::warn!(
                    repository = %repo,
                    received,
                    "Webhook write abandoned after timeout"
                );
            }
        }
    });

    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::dedup::DedupCache;
    use crate::store::{MemoryStore, RecordStore};

    fn state_over(store: Arc<MemoryStore>, secret: &str) -> WebhookState {
        let dedup = Arc::new(DedupCache::default());
        let writer = Arc::new(BatchWriter::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            dedup,
        ));
        WebhookState::new(secret, writer)
    }

    fn sample_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "repository": { "full_name": "acme/widgets" },
            "commits": [
                {
                    "id": "abc123",
                    "message": "fix the widget",
                    "timestamp": "2024-01-01T10:00:00Z",
                    "url": "https://example.com/c/abc123",
                    "author": { "name": "Ada", "email": "ada@example.com" }
                }
            ]
        }))
        .unwrap()
    }

    fn signed_headers(secret: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            sign_payload(secret, body).parse().unwrap(),
        );
        headers
    }

    async fn wait_for_records(store: &MemoryStore, expected: usize) {
        for _ in 0..100 {
            if store.len() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("store never reached {expected} records");
    }

    #[tokio::test]
    async fn valid_event_is_acknowledged_and_written() {
        let store = Arc::new(MemoryStore::new());
        let state = state_over(Arc::clone(&store), "s3cret");

        let body = sample_body();
        let headers = signed_headers("s3cret", &body);

        let status = handle_push(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        wait_for_records(&store, 1).await;
        assert_eq!(store.records()[0].identifier.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn tampered_body_is_rejected_before_any_write() {
        let store = Arc::new(MemoryStore::new());
        let state = state_over(Arc::clone(&store), "s3cret");

        let body = sample_body();
        let headers = signed_headers("s3cret", &body);

        // Tamper after signing.
        let mut tampered = body.clone();
        let pos = tampered
            .windows(6)
            .position(|w| w == b"abc123".as_slice())
            .unwrap();
        tampered[pos] = b'x';

        let status = handle_push(State(state), headers, Bytes::from(tampered)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let state = state_over(Arc::clone(&store), "s3cret");

        let status = handle_push(
            State(state),
            HeaderMap::new(),
            Bytes::from(sample_body()),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_bad_request() {
        let store = Arc::new(MemoryStore::new());
        let state = state_over(Arc::clone(&store), "s3cret");

        let body = b"not json at all".to_vec();
        let headers = signed_headers("s3cret", &body);

        let status = handle_push(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_push_is_acknowledged_without_writes() {
        let store = Arc::new(MemoryStore::new());
        let state = state_over(Arc::clone(&store), "s3cret");

        let body =
            serde_json::to_vec(&serde_json::json!({ "repository": { "full_name": "acme/widgets" } }))
                .unwrap();
        let headers = signed_headers("s3cret", &body);

        let status = handle_push(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty());
    }
}
