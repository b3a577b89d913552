//! Outbound call rate gate
//!
//! Shared throttle for the enrichment client. Holds the timestamp of the
//! last permitted call behind a mutex; `acquire` sleeps out the remainder
//! of the minimum interval and records the new timestamp before releasing
//! the lock, so concurrent callers can never be admitted closer together
//! than the configured interval.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Minimum-interval gate between outbound calls
pub struct RateGate {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Gate derived from a requests-per-second budget
    ///
    /// A non-positive budget disables throttling (zero interval).
    pub fn from_rps(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self::new(min_interval)
    }

    /// Block until the interval since the last permitted call has elapsed
    ///
    /// The check-and-update happens under one lock acquisition, so the gate
    /// is safe under concurrent callers.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
