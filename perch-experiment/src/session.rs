use crate::error::ExportError;
use crate::export::Destination;
use crate::library::StimulusLibrary;
use crate::trial::ActiveTrial;
use perch_core::{Condition, PerchId, TrialRecord};
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Running counters for one perch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerchStats {
    /// Completed (non-interrupted) trials.
    pub visits: u32,
    /// Trials that started playback, including ones later abandoned.
    pub triggers: u32,
    /// Trials that reached completion.
    pub trials: u32,
    pub interrupted: u32,
    /// Time on the perch across all trials, interrupted or not.
    pub occupancy: Duration,
    pub last_trigger: Option<u64>,
    /// Time between consecutive triggers on this perch.
    pub intervals: Vec<Duration>,
}

impl PerchStats {
    pub fn mean_interval(&self) -> Option<Duration> {
        if self.intervals.is_empty() {
            return None;
        }
        let total: Duration = self.intervals.iter().sum();
        Some(total / self.intervals.len() as u32)
    }
}

/// Ordered, append-only log of completed trials.
#[derive(Debug, Default)]
pub struct SessionRecorder {
    records: Vec<TrialRecord>,
    autosave: Option<Destination>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites `destination` after every append.
    pub fn with_autosave(destination: Destination) -> Self {
        Self {
            records: Vec::new(),
            autosave: Some(destination),
        }
    }

    pub fn append(&mut self, record: TrialRecord) {
        self.records.push(record);
        if let Some(dest) = &self.autosave {
            if let Err(e) = dest.write(&self.records) {
                warn!(path = %dest.path.display(), error = %e, "incremental flush failed");
            }
        }
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn flush(&self, destination: &Destination) -> Result<(), ExportError> {
        destination.write(&self.records)
    }
}

/// Everything the two perch loops share. Lives behind one mutex.
pub struct SessionState<R: Rng> {
    pub condition: Option<Condition>,
    gate: Option<PerchId>,
    perches: [PerchStats; 2],
    pub library: StimulusLibrary<R>,
    pub recorder: SessionRecorder,
}

impl<R: Rng> SessionState<R> {
    pub fn new(condition: Option<Condition>, library: StimulusLibrary<R>, recorder: SessionRecorder) -> Self {
        Self {
            condition,
            gate: None,
            perches: [PerchStats::default(), PerchStats::default()],
            library,
            recorder,
        }
    }

    /// Perch whose trial currently holds the playback gate.
    pub fn gate_holder(&self) -> Option<PerchId> {
        self.gate
    }

    pub fn try_acquire_gate(&mut self, perch: PerchId) -> bool {
        match self.gate {
            None => {
                self.gate = Some(perch);
                true
            }
            Some(holder) => holder == perch,
        }
    }

    pub fn release_gate(&mut self, perch: PerchId) {
        if self.gate == Some(perch) {
            self.gate = None;
        }
    }

    pub fn stats(&self, perch: PerchId) -> &PerchStats {
        &self.perches[perch.index()]
    }

    /// Stores the trigger time and returns the interval since the previous
    /// trigger on the same perch.
    pub fn note_trigger(&mut self, perch: PerchId, at: u64) -> Option<Duration> {
        let stats = &mut self.perches[perch.index()];
        stats.triggers += 1;
        let interval = stats
            .last_trigger
            .map(|prev| Duration::from_nanos(at.saturating_sub(prev)));
        if let Some(iv) = interval {
            stats.intervals.push(iv);
        }
        stats.last_trigger = Some(at);
        interval
    }

    /// Applies a resolved trial to the counters and appends its record.
    pub fn complete(
        &mut self,
        trial: &ActiveTrial,
        condition: Condition,
        interrupted: bool,
        spent: Duration,
    ) -> TrialRecord {
        let stats = &mut self.perches[trial.perch.index()];
        stats.trials += 1;
        if interrupted {
            stats.interrupted += 1;
        } else {
            stats.visits += 1;
        }
        stats.occupancy += spent;

        let record = TrialRecord {
            timestamp: chrono::Local::now(),
            perch_number: trial.perch,
            interrupted_trial: interrupted,
            sound_file: trial.stimulus.clone(),
            duration_spent: spent.as_secs_f64(),
            visit_count: stats.visits,
            total_time_on_perch: stats.occupancy.as_secs_f64(),
            experimental_condition: condition,
            triggered_at: Duration::from_nanos(trial.timestamps.triggered),
        };
        self.recorder.append(record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::TrialTimestamps;
    use perch_core::StimulusId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn state() -> SessionState<StdRng> {
        SessionState::new(
            Some(Condition::A),
            StimulusLibrary::new(StdRng::seed_from_u64(1)),
            SessionRecorder::new(),
        )
    }

    fn trial(perch: PerchId, triggered: u64) -> ActiveTrial {
        ActiveTrial {
            perch,
            pool: perch,
            stimulus: StimulusId::new("s.wav"),
            stimulus_duration: Duration::from_secs(3),
            timestamps: TrialTimestamps {
                dwell_start: 0,
                triggered,
                left: None,
            },
        }
    }

    #[test]
    fn gate_admits_one_perch_at_a_time() {
        let mut s = state();
        assert!(s.try_acquire_gate(PerchId::One));
        assert!(!s.try_acquire_gate(PerchId::Two));
        s.release_gate(PerchId::Two);
        assert_eq!(s.gate_holder(), Some(PerchId::One));
        s.release_gate(PerchId::One);
        assert!(s.try_acquire_gate(PerchId::Two));
    }

    #[test]
    fn intervals_start_from_second_trigger() {
        let mut s = state();
        assert_eq!(s.note_trigger(PerchId::One, 1_000), None);
        assert_eq!(s.note_trigger(PerchId::Two, 2_000), None);
        assert_eq!(s.note_trigger(PerchId::One, 4_000), Some(Duration::from_nanos(3_000)));
        assert_eq!(s.stats(PerchId::One).intervals.len(), 1);
        assert!(s.stats(PerchId::Two).intervals.is_empty());
    }

    #[test]
    fn interrupted_trials_add_occupancy_but_not_visits() {
        let mut s = state();
        let r1 = s.complete(&trial(PerchId::One, 0), Condition::A, false, Duration::from_secs(3));
        let r2 = s.complete(&trial(PerchId::One, 10), Condition::A, true, Duration::from_secs(1));
        assert_eq!(r1.visit_count, 1);
        assert_eq!(r2.visit_count, 1);
        assert!((r2.total_time_on_perch - 4.0).abs() < 1e-9);
        let stats = s.stats(PerchId::One);
        assert_eq!((stats.trials, stats.visits, stats.interrupted), (2, 1, 1));
        assert_eq!(s.recorder.len(), 2);
        assert_eq!(s.stats(PerchId::Two), &PerchStats::default());
    }

    #[test]
    fn autosave_rewrites_after_each_append() {
        let dir = tempfile::tempdir().unwrap();
        let dest = Destination::new(dir.path().join("log.csv"), crate::ExportFormat::Csv);
        let mut s = SessionState::new(
            Some(Condition::B),
            StimulusLibrary::new(StdRng::seed_from_u64(1)),
            SessionRecorder::with_autosave(dest.clone()),
        );
        s.complete(&trial(PerchId::Two, 0), Condition::B, false, Duration::from_secs(2));
        let text = std::fs::read_to_string(&dest.path).unwrap();
        assert_eq!(text.lines().count(), 2);
        s.complete(&trial(PerchId::Two, 5), Condition::B, true, Duration::from_secs(1));
        let text = std::fs::read_to_string(&dest.path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn mean_interval() {
        let stats = PerchStats {
            intervals: vec![Duration::from_secs(2), Duration::from_secs(4)],
            ..Default::default()
        };
        assert_eq!(stats.mean_interval(), Some(Duration::from_secs(3)));
        assert_eq!(PerchStats::default().mean_interval(), None);
    }
}
