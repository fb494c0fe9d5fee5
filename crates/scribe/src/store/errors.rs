use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when interacting with the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// API error from the store.
    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("Store rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    /// Authentication required or failed.
    #[error("Store authentication required")]
    AuthRequired,

    /// Resource not found (collection, record, etc.).
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The store rejected a write as a duplicate.
    #[error("Duplicate record: {resource}")]
    Conflict { resource: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },
}

impl StoreError {
    /// Create an API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Check if this error is a rate limit error.
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error is worth retrying (rate limit or transient
    /// network failure).
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network { .. })
    }

    /// Check if this error means the record already exists.
    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network {
            message: e.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
