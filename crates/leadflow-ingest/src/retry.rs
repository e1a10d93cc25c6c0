//! Bounded exponential-backoff retry around single API calls
//!
//! Every call goes through the shared [`RateLimiter`] first. Failures are
//! classified by [`IngestError`]: quota errors back off with jitter,
//! transient errors back off plainly, non-retryable errors propagate
//! immediately. After `max_retries` retries the executor fails with
//! `RetryExhausted` carrying the last underlying error.

use crate::error::{IngestError, Result};
use crate::rate_limit::RateLimiter;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base backoff delay.
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 500;

/// Backoff policy: `base * 2^attempt`, plus jitter for quota errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    /// Delay before retrying a failed attempt (0-based).
    ///
    /// Quota cooldowns add random jitter bounded by the base delay, which
    /// keeps the sequence of delays non-decreasing across attempts.
    pub fn backoff_for(&self, attempt: u32, quota: bool) -> Duration {
        let exp = attempt.min(16); // avoid shift overflow on absurd retry counts
        let backoff = self.base_backoff.saturating_mul(1u32 << exp);
        if quota {
            let jitter_ms = rand::thread_rng().gen_range(0..=self.base_backoff.as_millis() as u64);
            backoff + Duration::from_millis(jitter_ms)
        } else {
            backoff
        }
    }
}

/// Wraps a single API call with rate limiting and bounded retry.
#[derive(Debug)]
pub struct RetryExecutor {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op`, retrying retryable failures up to `max_retries` times.
    ///
    /// `what` names the call for log lines (e.g. "commentThreads.list").
    pub async fn execute<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt >= self.policy.max_retries {
                        return Err(IngestError::RetryExhausted {
                            attempts: attempt + 1,
                            source: Box::new(e),
                        });
                    }

                    let delay = self.policy.backoff_for(attempt, e.is_quota());
                    warn!(
                        call = %what,
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "API call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }
}
