//! Retry-on-503 for session requests.
//!
//! HTTP 503 is the only status treated as transient. The server may name a
//! delay through `Retry-After`; without one a jittered default is used. Any
//! other failure is returned on the spot.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::ApiError;

/// How session requests are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay used when the server sends no `Retry-After`.
    pub default_delay: Duration,
    /// Up to this fraction of `default_delay` is added at random.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            default_delay: Duration::from_secs(5),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retrying after `err`.
    #[must_use]
    pub fn delay_for(&self, err: &ApiError) -> Duration {
        if let Some(delay) = err.retry_after() {
            return delay;
        }
        if self.jitter > 0.0 {
            let factor = rand::rng().random_range(0.0..=self.jitter);
            self.default_delay.mul_f64(1.0 + factor)
        } else {
            self.default_delay
        }
    }
}

/// Run `request` until it succeeds, fails with something other than 503, or
/// `policy.max_attempts` attempts have been made.
///
/// # Errors
///
/// Returns the first non-503 error, or the last 503 once attempts run out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut request: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_unavailable() && attempt < max_attempts => {
                let delay = policy.delay_for(&err);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "server unavailable, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
