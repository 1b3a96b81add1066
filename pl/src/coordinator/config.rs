//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::queue::DEFAULT_QUEUE_CAPACITY;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Upper bound on one blocking receive in the poller, in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Pause after each log record sent to the logs collectors, in milliseconds
    #[serde(rename = "fan-out-interval-ms")]
    pub fan_out_interval_ms: u64,

    /// Slots in the log queue
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            poll_interval_ms: 1000,
            fan_out_interval_ms: 1000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl CoordinatorConfig {
    /// Poll interval as a Duration; never zero
    pub fn poll_interval(&self) -> Duration {
        debug!(poll_interval_ms = %self.poll_interval_ms, "CoordinatorConfig::poll_interval: called");
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn fan_out_interval(&self) -> Duration {
        Duration::from_millis(self.fan_out_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.fan_out_interval_ms, 1000);
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = CoordinatorConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_fan_out_interval_duration() {
        let config = CoordinatorConfig {
            fan_out_interval_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.fan_out_interval(), Duration::from_millis(250));
    }
}
