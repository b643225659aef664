use perch_core::{PerchId, StimulusId};
use std::time::Duration;

/// A trial between trigger and completion.
#[derive(Debug, Clone)]
pub struct ActiveTrial {
    pub perch: PerchId,
    pub pool: PerchId,
    pub stimulus: StimulusId,
    pub stimulus_duration: Duration,
    pub timestamps: TrialTimestamps,
}

#[derive(Debug, Clone)]
pub struct TrialTimestamps {
    pub dwell_start: u64,
    pub triggered: u64,
    pub left: Option<u64>,
}

impl ActiveTrial {
    /// Time spent on the perch since the trigger: up to the moment the
    /// animal left if it did, otherwise up to `now`.
    pub fn spent(&self, now: u64) -> Duration {
        let end = self.timestamps.left.unwrap_or(now);
        Duration::from_nanos(end.saturating_sub(self.timestamps.triggered))
    }

    /// Time from the first beam break to the trigger.
    pub fn dwell(&self) -> Duration {
        Duration::from_nanos(
            self.timestamps
                .triggered
                .saturating_sub(self.timestamps.dwell_start),
        )
    }
}
