use std::time::Duration;

use api::RetryPolicy;
use tracking_core::model::FlushThresholds;

/// Timing and threshold settings for a `ProgressTracker`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// How often the poller records elapsed time.
    pub poll_interval: Duration,
    /// Quiet period after the last update before a save is considered.
    pub debounce_delay: Duration,
    pub thresholds: FlushThresholds,
    pub retry: RetryPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            debounce_delay: Duration::from_millis(2_000),
            thresholds: FlushThresholds::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: FlushThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
