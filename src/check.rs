//! Bring-up routine: one beam break and one sound per perch.

use perch_core::PerchId;
use perch_experiment::{CancelToken, Presence, ResourceError, Rig};
use perch_timing::Timer;
use std::time::Duration;
use tracing::info;

const POLL: Duration = Duration::from_millis(100);
const HOLD: Duration = Duration::from_secs(1);

/// Walks through both perches in order. Returns `Ok(false)` if cancelled.
pub fn run<T: Timer>(rig: &Rig, timer: &T, cancel: &CancelToken) -> Result<bool, ResourceError> {
    for perch in PerchId::ALL {
        info!(perch = %perch, "testing perch, break the beam");
        if !wait_for(rig, timer, cancel, perch, Presence::Present)? {
            return Ok(false);
        }
        let stimulus = rig
            .catalog
            .list(perch)?
            .into_iter()
            .next()
            .ok_or(ResourceError::EmptyPool { pool: perch })?;
        info!(perch = %perch, stimulus = %stimulus, "beam broken, playing");
        rig.playback.play(&stimulus, perch, perch.pan())?;
        timer.sleep(HOLD);
        if !wait_for(rig, timer, cancel, perch, Presence::Clear)? {
            return Ok(false);
        }
        info!(perch = %perch, "beam restored");
    }
    Ok(true)
}

fn wait_for<T: Timer>(
    rig: &Rig,
    timer: &T,
    cancel: &CancelToken,
    perch: PerchId,
    want: Presence,
) -> Result<bool, ResourceError> {
    loop {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        if rig.sensor.read(perch)? == want {
            return Ok(true);
        }
        timer.sleep(POLL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_core::{Pan, StimulusId};
    use perch_experiment::{Playback, PlaybackHandle, SensorPort, StimulusCatalog};
    use perch_timing::ManualTimer;
    use std::sync::{Arc, Mutex};

    /// Perch `n` is occupied during seconds `[10n, 10n + 3)`.
    struct Visits(ManualTimer);

    impl SensorPort for Visits {
        fn read(&self, perch: PerchId) -> Result<Presence, ResourceError> {
            let s = self.0.now() / 1_000_000_000;
            let from = 10 * perch.number() as u64;
            Ok(if (from..from + 3).contains(&s) {
                Presence::Present
            } else {
                Presence::Clear
            })
        }
    }

    struct Done;
    impl PlaybackHandle for Done {
        fn is_active(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct Log(Mutex<Vec<(String, PerchId, Pan)>>);

    impl Playback for Log {
        fn play(&self, s: &StimulusId, pool: PerchId, pan: Pan) -> Result<Box<dyn PlaybackHandle>, ResourceError> {
            self.0.lock().unwrap().push((s.to_string(), pool, pan));
            Ok(Box::new(Done))
        }
        fn duration_of(&self, _: &StimulusId, _: PerchId) -> Result<Duration, ResourceError> {
            Ok(Duration::from_secs(1))
        }
    }

    struct Named;
    impl StimulusCatalog for Named {
        fn list(&self, pool: PerchId) -> Result<Vec<StimulusId>, ResourceError> {
            Ok(vec![StimulusId::new(format!("test_{pool}.wav"))])
        }
    }

    #[test]
    fn plays_once_per_perch_on_its_channel() {
        let timer = ManualTimer::new();
        let log = Arc::new(Log::default());
        let rig = Rig::new(Arc::new(Visits(timer.clone())), log.clone(), Arc::new(Named));

        assert!(run(&rig, &timer, &CancelToken::new()).unwrap());
        let played = log.0.lock().unwrap().clone();
        assert_eq!(
            played,
            [
                ("test_1.wav".to_string(), PerchId::One, Pan::LEFT),
                ("test_2.wav".to_string(), PerchId::Two, Pan::RIGHT),
            ]
        );
        assert!(timer.now() >= 23_000_000_000);
    }

    #[test]
    fn cancelled_check_stops_early() {
        let timer = ManualTimer::new();
        let log = Arc::new(Log::default());
        let rig = Rig::new(Arc::new(Visits(timer.clone())), log.clone(), Arc::new(Named));
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(!run(&rig, &timer, &cancel).unwrap());
        assert!(log.0.lock().unwrap().is_empty());
    }
}
