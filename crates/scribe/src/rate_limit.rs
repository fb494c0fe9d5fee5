//! Proactive client-side rate limiting for external APIs.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default rate limits per external service (requests per second).
pub mod rate_limits {
    /// The record store accepts roughly 3 requests/second sustained.
    pub const STORE_DEFAULT_RPS: u32 = 3;
    /// GitHub: 5000 requests/hour = ~1.4/sec, we use 10/sec to allow bursts.
    pub const SOURCE_DEFAULT_RPS: u32 = 10;
}

/// A standalone API rate limiter using the governor crate.
///
/// Callers `wait()` before each outbound request; the limiter suspends the
/// task until the configured rate allows another request.
///
/// # Example
///
/// ```ignore
/// use scribe::rate_limit::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::new(3); // 3 requests per second
///
/// // Before each API call:
/// limiter.wait().await;
/// store.create_record(&record).await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter with the specified requests per second.
    ///
    /// A zero rate is coerced to 1 request per second.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(1).unwrap());
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}
