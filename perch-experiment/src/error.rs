use perch_core::PerchId;
use thiserror::Error;

/// A collaborator (sensor, playback, catalog) could not do its job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("sensor for perch {perch} unavailable: {reason}")]
    Sensor { perch: PerchId, reason: String },
    #[error("playback of {stimulus} failed: {reason}")]
    Playback { stimulus: String, reason: String },
    #[error("stimulus catalog for pool {pool} unavailable: {reason}")]
    Catalog { pool: PerchId, reason: String },
    #[error("stimulus pool {pool} is empty")]
    EmptyPool { pool: PerchId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrialError {
    #[error("experimental condition not set")]
    Configuration,
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("trial interrupted by shutdown")]
    Interrupted,
    #[error("perch loop panicked")]
    Panicked,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write session log: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode session log: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures surfaced while shutting a session down.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("failed to release rig: {0}")]
    Release(#[from] ResourceError),
}
