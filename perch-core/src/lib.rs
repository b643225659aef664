pub mod condition;
pub mod perch;
pub mod stimulus;
pub mod trial;

pub use condition::{resolve_pool, Condition, ParseConditionError};
pub use perch::{Pan, PerchId};
pub use stimulus::StimulusId;
pub use trial::{TrialRecord, TrialState};
