//! Global API call spacing
//!
//! A single `RateLimiter` is shared (via `Arc`) by every worker that talks
//! to the provider. It guarantees a minimum interval between the start of
//! any two admitted calls regardless of how many workers are running.
//! Admission is first-ready-wins; no per-worker fairness is promised.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes outbound API calls to respect a minimum inter-call interval.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_admitted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_admitted: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until at least `min_interval` has elapsed since the most
    /// recently admitted call, then record the new admission.
    ///
    /// The slot is reserved under the lock and the wait happens outside
    /// it, so concurrent callers queue up without serializing their sleeps.
    pub async fn acquire(&self) {
        let target = {
            let mut last = self.last_admitted.lock().await;
            let now = Instant::now();
            let target = match *last {
                Some(prev) => now.max(prev + self.min_interval),
                None => now,
            };
            *last = Some(target);
            target
        };

        tokio::time::sleep_until(target).await;
    }
}
