//! Worker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Stand-in pacing for the stage workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Shortest simulated processing time, in milliseconds
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Longest simulated processing time, in milliseconds
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        debug!("WorkerConfig::default: called");
        Self {
            min_delay_ms: 1000,
            max_delay_ms: 9000,
        }
    }
}

impl WorkerConfig {
    /// Delay bounds, ordered so that `min <= max`
    pub fn delay_range(&self) -> (Duration, Duration) {
        let lo = self.min_delay_ms.min(self.max_delay_ms);
        let hi = self.min_delay_ms.max(self.max_delay_ms);
        (Duration::from_millis(lo), Duration::from_millis(hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(
            config.delay_range(),
            (Duration::from_secs(1), Duration::from_secs(9))
        );
    }

    #[test]
    fn test_swapped_bounds_are_ordered() {
        let config = WorkerConfig {
            min_delay_ms: 500,
            max_delay_ms: 100,
        };
        assert_eq!(
            config.delay_range(),
            (Duration::from_millis(100), Duration::from_millis(500))
        );
    }
}
