use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing parameters of the trial state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub poll_interval_ms: u64,
    pub dwell_threshold_ms: u64,
    pub inter_trial_interval_ms: u64,
    /// Rewrite the session file after every completed trial.
    pub flush_every_trial: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            dwell_threshold_ms: 2000,
            inter_trial_interval_ms: 5000,
            flush_every_trial: false,
        }
    }
}

impl ExperimentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn dwell_threshold(&self) -> Duration {
        Duration::from_millis(self.dwell_threshold_ms)
    }

    pub fn inter_trial_interval(&self) -> Duration {
        Duration::from_millis(self.inter_trial_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: ExperimentConfig = serde_json::from_str(r#"{"dwell_threshold_ms": 1500}"#).unwrap();
        assert_eq!(cfg.dwell_threshold(), Duration::from_millis(1500));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.inter_trial_interval(), Duration::from_secs(5));
        assert!(!cfg.flush_every_trial);
    }
}
