pub mod config;
pub mod error;
pub mod export;
pub mod io;
pub mod library;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod trial;
pub use config::ExperimentConfig;
pub use error::{ExportError, ResourceError, SessionError, TrialError};
pub use export::{Destination, ExportFormat};
pub use io::{Playback, PlaybackHandle, Presence, Rig, SensorPort, StimulusCatalog};
pub use library::{Selection, StimulusLibrary};
pub use scheduler::{CancelToken, Scheduler, SessionReport};
pub use session::{PerchStats, SessionRecorder, SessionState};
pub use state::{TrialController, TrialOutcome};
pub use trial::{ActiveTrial, TrialTimestamps};
