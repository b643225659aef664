#![allow(dead_code)]

use perch_core::{Pan, PerchId, StimulusId};
use perch_experiment::{
    CancelToken, Playback, PlaybackHandle, Presence, ResourceError, Rig, SensorPort,
    StimulusCatalog,
};
use perch_timing::Timer;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn ms(n: u64) -> u64 {
    n * 1_000_000
}

/// Presence scripted as half-open windows of timer time per perch.
pub struct ScriptedSensor<T: Timer> {
    pub timer: T,
    pub windows: [Vec<(u64, u64)>; 2],
    pub always: [bool; 2],
    pub broken: [bool; 2],
    pub cancel_at: Mutex<Option<(u64, CancelToken)>>,
    pub released: AtomicBool,
    /// Set on release if this file already existed.
    pub expect_flushed: Option<PathBuf>,
    pub flushed_before_release: AtomicBool,
    /// Runs on every read with the current timer time.
    pub on_read: Mutex<Option<Box<dyn Fn(u64) + Send + Sync>>>,
}

impl<T: Timer> ScriptedSensor<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            windows: [Vec::new(), Vec::new()],
            always: [false, false],
            broken: [false, false],
            cancel_at: Mutex::new(None),
            released: AtomicBool::new(false),
            expect_flushed: None,
            flushed_before_release: AtomicBool::new(false),
            on_read: Mutex::new(None),
        }
    }

    pub fn present(mut self, perch: PerchId, from_ms: u64, to_ms: u64) -> Self {
        self.windows[perch.index()].push((ms(from_ms), ms(to_ms)));
        self
    }

    pub fn always_present(mut self, perch: PerchId) -> Self {
        self.always[perch.index()] = true;
        self
    }

    pub fn broken(mut self, perch: PerchId) -> Self {
        self.broken[perch.index()] = true;
        self
    }

    pub fn cancel_at(self, at_ms: u64, token: CancelToken) -> Self {
        *self.cancel_at.lock().unwrap() = Some((ms(at_ms), token));
        self
    }

    pub fn set_on_read(&self, hook: impl Fn(u64) + Send + Sync + 'static) {
        *self.on_read.lock().unwrap() = Some(Box::new(hook));
    }
}

impl<T: Timer> SensorPort for ScriptedSensor<T> {
    fn read(&self, perch: PerchId) -> Result<Presence, ResourceError> {
        let now = self.timer.now();
        if let Some(hook) = self.on_read.lock().unwrap().as_ref() {
            hook(now);
        }
        if let Some((at, token)) = self.cancel_at.lock().unwrap().as_ref() {
            if now >= *at {
                token.cancel();
            }
        }
        if self.broken[perch.index()] {
            return Err(ResourceError::Sensor {
                perch,
                reason: "line unreadable".into(),
            });
        }
        let present = self.always[perch.index()]
            || self.windows[perch.index()]
                .iter()
                .any(|&(from, to)| from <= now && now < to);
        Ok(if present {
            Presence::Present
        } else {
            Presence::Clear
        })
    }

    fn release(&self) -> Result<(), ResourceError> {
        if let Some(path) = &self.expect_flushed {
            self.flushed_before_release
                .store(path.exists(), Ordering::SeqCst);
        }
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TimedHandle<T: Timer> {
    timer: T,
    end: u64,
}

impl<T: Timer> PlaybackHandle for TimedHandle<T> {
    fn is_active(&self) -> bool {
        self.timer.now() < self.end
    }
}

/// Playback whose stimuli all last `length` on the shared timer.
pub struct FakePlayback<T: Timer> {
    pub timer: T,
    pub length: Duration,
    pub fail: bool,
    pub started: Mutex<Vec<(StimulusId, PerchId, Pan)>>,
    pub released: AtomicBool,
}

impl<T: Timer> FakePlayback<T> {
    pub fn new(timer: T, length: Duration) -> Self {
        Self {
            timer,
            length,
            fail: false,
            started: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        }
    }

    pub fn started(&self) -> Vec<(StimulusId, PerchId, Pan)> {
        self.started.lock().unwrap().clone()
    }
}

impl<T: Timer + 'static> Playback for FakePlayback<T> {
    fn play(
        &self,
        stimulus: &StimulusId,
        pool: PerchId,
        pan: Pan,
    ) -> Result<Box<dyn PlaybackHandle>, ResourceError> {
        if self.fail {
            return Err(ResourceError::Playback {
                stimulus: stimulus.to_string(),
                reason: "no free channel".into(),
            });
        }
        self.started
            .lock()
            .unwrap()
            .push((stimulus.clone(), pool, pan));
        Ok(Box::new(TimedHandle {
            timer: self.timer.clone(),
            end: self.timer.now() + self.length.as_nanos() as u64,
        }))
    }

    fn duration_of(&self, _: &StimulusId, _: PerchId) -> Result<Duration, ResourceError> {
        Ok(self.length)
    }

    fn release(&self) -> Result<(), ResourceError> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Pool 1 holds `p1_*.wav`, pool 2 holds `p2_*.wav`.
pub struct TwoFolders;

impl StimulusCatalog for TwoFolders {
    fn list(&self, pool: PerchId) -> Result<Vec<StimulusId>, ResourceError> {
        Ok(["a", "b", "c"]
            .iter()
            .map(|s| StimulusId::new(format!("p{}_{}.wav", pool.number(), s)))
            .collect())
    }
}

pub fn rig<T: Timer + 'static>(
    sensor: Arc<ScriptedSensor<T>>,
    playback: Arc<FakePlayback<T>>,
) -> Rig {
    Rig::new(sensor, playback, Arc::new(TwoFolders))
}
