//! Collaborators the trial state machine talks to. Hardware implementations
//! live in the rig binary; tests script them.

use crate::error::ResourceError;
use perch_core::{Pan, PerchId, StimulusId};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Clear,
}

/// Polled presence input, one line per perch.
pub trait SensorPort: Send + Sync {
    fn read(&self, perch: PerchId) -> Result<Presence, ResourceError>;

    fn release(&self) -> Result<(), ResourceError> {
        Ok(())
    }
}

pub trait PlaybackHandle: Send {
    fn is_active(&self) -> bool;
}

/// Fire-and-forget audio output. `pool` names the catalog the stimulus came from.
pub trait Playback: Send + Sync {
    fn play(
        &self,
        stimulus: &StimulusId,
        pool: PerchId,
        pan: Pan,
    ) -> Result<Box<dyn PlaybackHandle>, ResourceError>;

    fn duration_of(&self, stimulus: &StimulusId, pool: PerchId) -> Result<Duration, ResourceError>;

    fn release(&self) -> Result<(), ResourceError> {
        Ok(())
    }
}

pub trait StimulusCatalog: Send + Sync {
    fn list(&self, pool: PerchId) -> Result<Vec<StimulusId>, ResourceError>;
}

/// The set of collaborators a session runs against.
#[derive(Clone)]
pub struct Rig {
    pub sensor: Arc<dyn SensorPort>,
    pub playback: Arc<dyn Playback>,
    pub catalog: Arc<dyn StimulusCatalog>,
}

impl Rig {
    pub fn new(
        sensor: Arc<dyn SensorPort>,
        playback: Arc<dyn Playback>,
        catalog: Arc<dyn StimulusCatalog>,
    ) -> Self {
        Self {
            sensor,
            playback,
            catalog,
        }
    }

    /// Tears down sensor and playback. Both are attempted; the first error wins.
    pub fn release(&self) -> Result<(), ResourceError> {
        let sensor = self.sensor.release();
        let playback = self.playback.release();
        sensor.and(playback)
    }
}
