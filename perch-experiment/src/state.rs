use crate::config::ExperimentConfig;
use crate::error::TrialError;
use crate::io::{PlaybackHandle, Presence, Rig};
use crate::scheduler::CancelToken;
use crate::session::SessionState;
use crate::trial::{ActiveTrial, TrialTimestamps};
use perch_core::{resolve_pool, Condition, PerchId, TrialRecord, TrialState};
use perch_timing::Timer;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of one pass through the trial state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    /// Nobody on the perch.
    Clear,
    /// Another perch holds the playback gate.
    Blocked,
    /// The animal left before the dwell threshold.
    Aborted { dwell: Duration },
    Completed(TrialRecord),
}

pub(crate) fn lock_session<R: Rng>(
    session: &Mutex<SessionState<R>>,
) -> MutexGuard<'_, SessionState<R>> {
    // every mutation completes before its guard drops, so a poisoned
    // state is still consistent
    session.lock().unwrap_or_else(|p| p.into_inner())
}

/// Holds the session-wide playback gate for one perch; releases it on drop.
struct GateGuard<R: Rng> {
    perch: PerchId,
    session: Arc<Mutex<SessionState<R>>>,
}

impl<R: Rng> Drop for GateGuard<R> {
    fn drop(&mut self) {
        lock_session(&self.session).release_gate(self.perch);
    }
}

struct Triggered<R: Rng> {
    trial: ActiveTrial,
    condition: Condition,
    handle: Box<dyn PlaybackHandle>,
    gate: GateGuard<R>,
}

/// Drives one perch: debounce, trigger, monitor playback, record.
pub struct TrialController<T: Timer, R: Rng> {
    perch: PerchId,
    config: ExperimentConfig,
    rig: Rig,
    timer: T,
    session: Arc<Mutex<SessionState<R>>>,
    cancel: CancelToken,
    state: TrialState,
}

impl<T, R> TrialController<T, R>
where
    T: Timer,
    R: Rng,
{
    pub fn new(
        perch: PerchId,
        config: ExperimentConfig,
        rig: Rig,
        timer: T,
        session: Arc<Mutex<SessionState<R>>>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            perch,
            config,
            rig,
            timer,
            session,
            cancel,
            state: TrialState::Idle,
        }
    }

    pub fn perch(&self) -> PerchId {
        self.perch
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Runs trials until cancelled. Resource failures end this perch's loop.
    pub fn run(&mut self) -> Result<(), TrialError> {
        info!(perch = %self.perch, "monitoring perch");
        while !self.cancel.is_cancelled() {
            match self.attempt() {
                Ok(TrialOutcome::Completed(_)) => {}
                Ok(_) => self.timer.sleep(self.config.poll_interval()),
                Err(TrialError::Interrupted) => break,
                Err(TrialError::Configuration) => {
                    error!(perch = %self.perch, "experimental condition not set, trial skipped");
                    self.timer.sleep(self.config.poll_interval());
                }
                Err(e) => {
                    error!(perch = %self.perch, error = %e, "perch loop stopped");
                    self.transition(TrialState::Idle);
                    return Err(e);
                }
            }
        }
        self.transition(TrialState::Idle);
        info!(perch = %self.perch, "stopped monitoring perch");
        Ok(())
    }

    /// One pass from `Idle`: returns as soon as the perch is clear or blocked,
    /// otherwise follows the trial through to completion and the quiet period.
    pub fn attempt(&mut self) -> Result<TrialOutcome, TrialError> {
        self.transition(TrialState::Idle);
        self.check_cancel()?;
        if self.read()? == Presence::Clear {
            return Ok(TrialOutcome::Clear);
        }
        if lock_session(&self.session).gate_holder().is_some() {
            return Ok(TrialOutcome::Blocked);
        }

        self.transition(TrialState::Debouncing);
        let dwell_start = self.timer.now();
        let threshold = self.config.dwell_threshold();
        loop {
            self.check_cancel()?;
            if self.read()? == Presence::Clear {
                return Ok(self.abort(dwell_start));
            }
            if self.timer.elapsed(dwell_start) >= threshold {
                break;
            }
            self.timer.sleep(self.config.poll_interval());
        }

        // a perch that loses the race for the gate keeps its dwell and
        // waits for the gate to clear
        let triggered = loop {
            self.check_cancel()?;
            if let Some(t) = self.trigger(dwell_start)? {
                break t;
            }
            self.timer.sleep(self.config.poll_interval());
            if self.read()? == Presence::Clear {
                return Ok(self.abort(dwell_start));
            }
        };
        let Triggered {
            mut trial,
            condition,
            handle,
            gate,
        } = triggered;

        self.transition(TrialState::Playing);
        let mut interrupted = false;
        while handle.is_active() {
            self.check_cancel()?;
            if self.read()? == Presence::Clear {
                interrupted = true;
                trial.timestamps.left = Some(self.timer.now());
                break;
            }
            self.timer.sleep(self.config.poll_interval());
        }

        self.transition(TrialState::Completed);
        let spent = trial.spent(self.timer.now());
        let record = lock_session(&self.session).complete(&trial, condition, interrupted, spent);
        if interrupted {
            info!(
                perch = %self.perch,
                pool = %trial.pool,
                spent_s = spent.as_secs_f64(),
                "beam restored on perch before playback ended, trial interrupted"
            );
        } else {
            info!(
                perch = %self.perch,
                pool = %trial.pool,
                visits = record.visit_count,
                spent_s = spent.as_secs_f64(),
                "trial complete"
            );
        }

        info!(
            seconds = self.config.inter_trial_interval().as_secs_f64(),
            "waiting before the next trial"
        );
        self.quiet_period();
        drop(gate);
        self.transition(TrialState::Idle);
        Ok(TrialOutcome::Completed(record))
    }

    /// Claims the gate and starts playback. `None` if another perch holds
    /// the gate. Catalog listing, duration query and playback start run
    /// outside the session lock; on failure the gate is released and the
    /// played-set is untouched.
    fn trigger(&mut self, dwell_start: u64) -> Result<Option<Triggered<R>>, TrialError> {
        let condition = {
            let mut session = lock_session(&self.session);
            if session.gate_holder().is_some() {
                return Ok(None);
            }
            let condition = session.condition.ok_or(TrialError::Configuration)?;
            session.try_acquire_gate(self.perch);
            condition
        };
        let gate = GateGuard {
            perch: self.perch,
            session: Arc::clone(&self.session),
        };
        self.transition(TrialState::Triggered);

        let pool = resolve_pool(self.perch, condition);
        let listing = self.rig.catalog.list(pool)?;
        let selection = lock_session(&self.session).library.select_from(pool, listing);
        let selection = selection?;
        let stimulus = selection.stimulus.clone();
        let stimulus_duration = self.rig.playback.duration_of(&stimulus, pool)?;
        let handle = self.rig.playback.play(&stimulus, pool, self.perch.pan())?;

        let triggered_at = self.timer.now();
        {
            let mut session = lock_session(&self.session);
            session.library.commit(selection);
            if let Some(interval) = session.note_trigger(self.perch, triggered_at) {
                debug!(perch = %self.perch, interval_s = interval.as_secs_f64(), "inter-visit interval");
            }
        }

        let trial = ActiveTrial {
            perch: self.perch,
            pool,
            stimulus,
            stimulus_duration,
            timestamps: TrialTimestamps {
                dwell_start,
                triggered: triggered_at,
                left: None,
            },
        };
        info!(
            perch = %self.perch,
            pool = %trial.pool,
            stimulus = %trial.stimulus,
            duration_s = trial.stimulus_duration.as_secs_f64(),
            dwell_s = trial.dwell().as_secs_f64(),
            "beam broken on perch, playing stimulus"
        );
        Ok(Some(Triggered {
            trial,
            condition,
            handle,
            gate,
        }))
    }

    fn abort(&mut self, dwell_start: u64) -> TrialOutcome {
        let dwell = self.timer.elapsed(dwell_start);
        debug!(perch = %self.perch, dwell_s = dwell.as_secs_f64(), "left before dwell threshold");
        self.transition(TrialState::Idle);
        TrialOutcome::Aborted { dwell }
    }

    /// Sleeps out the inter-trial interval in poll steps so shutdown is not delayed.
    fn quiet_period(&self) {
        let start = self.timer.now();
        let total = self.config.inter_trial_interval();
        let step = self.config.poll_interval().max(Duration::from_millis(1));
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let elapsed = self.timer.elapsed(start);
            if elapsed >= total {
                return;
            }
            self.timer.sleep(step.min(total - elapsed));
        }
    }

    fn read(&self) -> Result<Presence, TrialError> {
        self.rig.sensor.read(self.perch).map_err(|e| {
            warn!(perch = %self.perch, error = %e, "sensor read failed");
            TrialError::Resource(e)
        })
    }

    fn check_cancel(&self) -> Result<(), TrialError> {
        if self.cancel.is_cancelled() {
            Err(TrialError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, next: TrialState) {
        if self.state != next {
            debug!(perch = %self.perch, from = ?self.state, to = ?next, "trial state");
            self.state = next;
        }
    }
}
