use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque handle naming one stimulus in a catalog (a file name on the rig).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StimulusId(Arc<str>);

impl StimulusId {
    pub fn new(name: impl AsRef<str>) -> Self {
        StimulusId(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StimulusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StimulusId {
    fn from(s: &str) -> Self {
        StimulusId::new(s)
    }
}

impl From<String> for StimulusId {
    fn from(s: String) -> Self {
        StimulusId(Arc::from(s))
    }
}
