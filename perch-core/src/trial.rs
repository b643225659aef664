use crate::{Condition, PerchId, StimulusId};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-perch trial state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    Debouncing,
    Triggered,
    Playing,
    Completed,
}

/// Snapshot of one resolved trial. Serialized field order follows the rig's
/// tabular export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub timestamp: DateTime<Local>,
    pub perch_number: PerchId,
    pub interrupted_trial: bool,
    pub sound_file: StimulusId,
    /// Seconds from trigger to the end of monitoring.
    pub duration_spent: f64,
    pub visit_count: u32,
    pub total_time_on_perch: f64,
    pub experimental_condition: Condition,
    /// Trigger time on the session's monotonic clock.
    #[serde(skip)]
    pub triggered_at: Duration,
}

impl TrialRecord {
    /// Monotonic interval `[trigger, trigger + duration)` covered by the trial.
    pub fn window(&self) -> (Duration, Duration) {
        let start = self.triggered_at;
        (start, start + Duration::from_secs_f64(self.duration_spent))
    }

    pub fn overlaps(&self, other: &TrialRecord) -> bool {
        let (a0, a1) = self.window();
        let (b0, b1) = other.window();
        a0 < b1 && b0 < a1
    }
}
