//! Monitoring loop settings.

use crate::analysis::ReasoningDepth;
use crate::history::DEFAULT_WINDOW;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Monitoring loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between automatic cycles.
    pub interval_secs: u64,
    /// Size of the recent-history window.
    pub history_window: usize,
    /// Reasoning depth requested by default.
    pub reasoning_depth: ReasoningDepth,
    /// Initial experiment context.
    pub context: String,
    /// Buffered events per subscriber before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            history_window: DEFAULT_WINDOW,
            reasoning_depth: ReasoningDepth::Low,
            context: String::new(),
            event_capacity: 64,
        }
    }
}

impl MonitorConfig {
    /// Period of the automatic loop.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), MonitorConfigError> {
        if self.interval_secs == 0 {
            return Err(MonitorConfigError::ZeroInterval);
        }
        if self.history_window == 0 {
            return Err(MonitorConfigError::EmptyWindow);
        }
        if self.event_capacity == 0 {
            return Err(MonitorConfigError::ZeroEventCapacity);
        }
        Ok(())
    }
}

/// Monitor configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorConfigError {
    #[error("monitoring interval must be at least one second")]
    ZeroInterval,
    #[error("history window must hold at least one entry")]
    EmptyWindow,
    #[error("event capacity must be non-zero")]
    ZeroEventCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.history_window, 20);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = MonitorConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(MonitorConfigError::ZeroInterval));
    }
}
