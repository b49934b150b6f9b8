use std::time::Duration;

use bqsink_config::shared::RetryConfig;
use rand::Rng;

/// Exponential backoff with full jitter and a bounded number of attempts.
///
/// The wait after attempt `n` is drawn uniformly from `0..=min(max, initial * 2^(n-1))`, which
/// spreads retries of many sinks better than additive jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max: max.max(initial),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Total number of insert attempts per batch, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound of the wait following `attempt`, counted from 1.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial
            .saturating_mul(1u32 << exponent)
            .min(self.max)
    }

    /// Draws the wait following `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt).as_millis() as u64;
        let jitter = rand::rng().random_range(0..=ceiling);

        Duration::from_millis(jitter)
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.initial_backoff(),
            config.max_backoff(),
            config.max_attempts,
        )
    }
}
