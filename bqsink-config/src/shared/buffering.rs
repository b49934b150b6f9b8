use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Buffering behavior of the sink.
///
/// Events are accumulated in memory and published when `interval_ms` elapses or when `count`
/// events are buffered, whichever comes first. At most `max_buffer_size` events can be
/// outstanding; further events are dropped.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BufferingConfig {
    /// Interval, in milliseconds, between two timer-triggered publishes.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Number of buffered events that triggers a publish.
    #[serde(default = "default_count")]
    pub count: usize,
    /// Maximum number of outstanding events before incoming events are dropped.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
    /// Maximum time, in milliseconds, a flush waits for the buffer to drain.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

impl BufferingConfig {
    pub const DEFAULT_INTERVAL_MS: u64 = 30_000;

    pub const DEFAULT_COUNT: usize = 200;

    pub const DEFAULT_MAX_BUFFER_SIZE: usize = 30_000;

    pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 60_000;

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Validates buffering settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_ms == 0 {
            return Err(ValidationError::invalid(
                "buffering.interval_ms",
                "must be greater than 0",
            ));
        }

        if self.count == 0 {
            return Err(ValidationError::invalid(
                "buffering.count",
                "must be greater than 0",
            ));
        }

        if self.max_buffer_size == 0 {
            return Err(ValidationError::invalid(
                "buffering.max_buffer_size",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for BufferingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            count: default_count(),
            max_buffer_size: default_max_buffer_size(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    BufferingConfig::DEFAULT_INTERVAL_MS
}

fn default_count() -> usize {
    BufferingConfig::DEFAULT_COUNT
}

fn default_max_buffer_size() -> usize {
    BufferingConfig::DEFAULT_MAX_BUFFER_SIZE
}

fn default_flush_timeout_ms() -> u64 {
    BufferingConfig::DEFAULT_FLUSH_TIMEOUT_MS
}
