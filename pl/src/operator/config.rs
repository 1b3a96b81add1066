//! Operator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Operator console configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// How long to wait for the coordinator's answer, in milliseconds
    #[serde(rename = "reply-timeout-ms")]
    pub reply_timeout_ms: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self { reply_timeout_ms: 5000 }
    }
}

impl OperatorConfig {
    /// Reply timeout; never zero, since a zero socket timeout means "wait forever"
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms.max(1))
    }
}
