use crate::config::ExperimentConfig;
use crate::error::{SessionError, TrialError};
use crate::export::Destination;
use crate::io::Rig;
use crate::library::StimulusLibrary;
use crate::session::{PerchStats, SessionRecorder, SessionState};
use crate::state::{lock_session, TrialController};
use perch_core::{Condition, PerchId, TrialRecord};
use perch_timing::Timer;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{error, info};

/// Cloneable shutdown flag shared by every perch loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a finished session leaves behind.
#[derive(Debug)]
pub struct SessionReport {
    pub records: Vec<TrialRecord>,
    pub perches: [PerchStats; 2],
    /// Perch loops that stopped on an error rather than on cancellation.
    pub failures: Vec<(PerchId, TrialError)>,
}

impl SessionReport {
    pub fn stats(&self, perch: PerchId) -> &PerchStats {
        &self.perches[perch.index()]
    }

    /// Logs per-perch totals.
    pub fn summarize(&self) {
        info!(trials = self.records.len(), "session results");
        for perch in PerchId::ALL {
            let s = self.stats(perch);
            info!(
                perch = %perch,
                trials = s.trials,
                visits = s.visits,
                interrupted = s.interrupted,
                occupancy_s = s.occupancy.as_secs_f64(),
                mean_interval_s = ?s.mean_interval().map(|d| d.as_secs_f64()),
                "perch summary"
            );
        }
    }
}

/// Runs one trial controller per perch, in parallel, until cancelled.
pub struct Scheduler<T: Timer, R: Rng + Send> {
    config: ExperimentConfig,
    rig: Rig,
    timer: T,
    session: Arc<Mutex<SessionState<R>>>,
    cancel: CancelToken,
}

impl<T, R> Scheduler<T, R>
where
    T: Timer,
    R: Rng + Send,
{
    pub fn new(
        config: ExperimentConfig,
        condition: Option<Condition>,
        rig: Rig,
        timer: T,
        rng: R,
        recorder: SessionRecorder,
    ) -> Self {
        let session = SessionState::new(condition, StimulusLibrary::new(rng), recorder);
        Self {
            config,
            rig,
            timer,
            session: Arc::new(Mutex::new(session)),
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> Arc<Mutex<SessionState<R>>> {
        Arc::clone(&self.session)
    }

    /// Blocks until both perch loops end, then flushes the log to
    /// `destination` and releases the rig. Release runs even if the flush fails.
    pub fn run(self, destination: Option<&Destination>) -> Result<SessionReport, SessionError> {
        let failures = thread::scope(|scope| {
            let handles: Vec<_> = PerchId::ALL
                .into_iter()
                .map(|perch| {
                    let mut controller = TrialController::new(
                        perch,
                        self.config.clone(),
                        self.rig.clone(),
                        self.timer.clone(),
                        Arc::clone(&self.session),
                        self.cancel.clone(),
                    );
                    (perch, scope.spawn(move || controller.run()))
                })
                .collect();

            let mut failures = Vec::new();
            for (perch, handle) in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => failures.push((perch, e)),
                    Err(_) => {
                        error!(perch = %perch, "perch loop panicked");
                        failures.push((perch, TrialError::Panicked));
                    }
                }
            }
            failures
        });

        let session = lock_session(&self.session);
        let flushed = match destination {
            Some(dest) => {
                let res = session.recorder.flush(dest);
                if res.is_ok() {
                    info!(path = %dest.path.display(), trials = session.recorder.len(), "data exported");
                }
                res
            }
            None => Ok(()),
        };
        let released = self.rig.release();
        if released.is_ok() {
            info!("rig released");
        }

        let report = SessionReport {
            records: session.recorder.records().to_vec(),
            perches: [
                session.stats(PerchId::One).clone(),
                session.stats(PerchId::Two).clone(),
            ],
            failures,
        };
        flushed?;
        released?;
        Ok(report)
    }
}
