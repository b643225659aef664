use anyhow::{Context, Result};
use perch_core::PerchId;
use perch_experiment::ExperimentConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full rig configuration, read from JSON. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub experiment: ExperimentConfig,
    pub gpio: GpioConfig,
    pub audio: AudioConfig,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub sysfs_root: PathBuf,
    /// BCM line per perch, perch 1 first.
    pub perch_pins: [u32; 2],
    /// A broken beam pulls the line low.
    pub active_low: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Stimulus folder per pool, pool 1 first.
    pub pool_folders: [PathBuf; 2],
    pub extension: String,
    /// Player invocation. `{file}`, `{left}` and `{right}` are substituted.
    pub player: Vec<String>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            experiment: ExperimentConfig::default(),
            gpio: GpioConfig::default(),
            audio: AudioConfig::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            perch_pins: [4, 5],
            active_low: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            pool_folders: [
                PathBuf::from("audio/perch_1"),
                PathBuf::from("audio/perch_2"),
            ],
            extension: "wav".to_string(),
            player: ["play", "-q", "{file}", "remix", "1v{left}", "1v{right}"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl GpioConfig {
    pub fn pin(&self, perch: PerchId) -> u32 {
        self.perch_pins[perch.index()]
    }
}

impl AudioConfig {
    pub fn folder(&self, pool: PerchId) -> &Path {
        &self.pool_folders[pool.index()]
    }
}

impl RigConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
