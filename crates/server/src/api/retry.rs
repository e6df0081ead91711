//! Backoff and rate-limit wait policy for price API requests.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts for transport failures, including the first request.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Spread each delay by up to 25% either way.
    pub jitter: bool,
    /// Used when a 429 carries no usable `Retry-After`.
    pub default_rate_limit_wait: Duration,
    /// Consecutive 429 waits tolerated within one fetch.
    pub max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: false,
            default_rate_limit_wait: Duration::from_secs(60),
            max_rate_limit_waits: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            let jitter_range = capped * 0.25;
            let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(final_ms as u64)
    }

    /// How long to wait out a 429, from its `Retry-After` header value.
    /// Only integer seconds are honoured.
    pub fn rate_limit_wait(&self, retry_after: Option<&str>) -> Duration {
        retry_after
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_rate_limit_wait)
    }
}
