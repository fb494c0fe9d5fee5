//! Shared retry utilities for external-service operations.
//!
//! Both the record store client and the backfill source use the same
//! exponential backoff policy when an operation is rate limited.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::sync::{
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_WRITE_RETRIES, ProgressCallback, SyncProgress, emit,
};

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_WRITE_RETRIES as usize,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Build the default exponential backoff strategy.
///
/// Initial delay 1 second, maximum delay 60 seconds, 5 retries, jitter on.
#[must_use]
pub fn default_backoff() -> ExponentialBuilder {
    RetryConfig::default().into_backoff()
}

/// Execute an operation with automatic retry on retryable errors.
///
/// Tracks retry attempts, uses exponential backoff with jitter, and reports
/// each backoff via the progress callback and debug-level tracing.
///
/// # Arguments
///
/// * `operation` - The async operation to retry.
/// * `is_retryable` - Predicate deciding whether an error is worth retrying.
/// * `context` - Label for progress reporting (e.g. `acme/widgets`).
/// * `on_progress` - Optional callback for reporting retry progress.
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    mut operation: F,
    is_retryable: IsRetryable,
    context: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRetryable: Fn(&E) -> bool + Send + Sync + 'static,
{
    let context_str = context.to_string();

    // Track attempt number for progress reporting
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(default_backoff())
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            emit(
                on_progress,
                SyncProgress::RateLimitBackoff {
                    context: context_str.clone(),
                    retry_after_ms: dur.as_millis() as u64,
                    attempt: current_attempt,
                },
            );
            tracing::debug!(
                context = %context_str,
                retry_in = ?dur,
                attempt = current_attempt,
                error = %err,
                "Backing off before retry"
            );
        })
        .when(is_retryable)
        .await
}
