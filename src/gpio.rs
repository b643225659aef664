use crate::config::GpioConfig;
use perch_core::PerchId;
use perch_experiment::{Presence, ResourceError, SensorPort};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Beam-break inputs read through the sysfs GPIO interface.
pub struct SysfsSensor {
    cfg: GpioConfig,
    /// Lines this process exported and must hand back.
    exported: Mutex<Vec<u32>>,
}

impl SysfsSensor {
    pub fn open(cfg: &GpioConfig) -> Result<Self, ResourceError> {
        let sensor = Self {
            cfg: cfg.clone(),
            exported: Mutex::new(Vec::new()),
        };
        for perch in PerchId::ALL {
            // on failure, Drop unexports whatever was already claimed
            sensor.setup(perch)?;
        }
        info!(pins = ?sensor.cfg.perch_pins, root = %sensor.cfg.sysfs_root.display(), "GPIO inputs ready");
        Ok(sensor)
    }

    fn line_dir(&self, pin: u32) -> PathBuf {
        self.cfg.sysfs_root.join(format!("gpio{pin}"))
    }

    fn setup(&self, perch: PerchId) -> Result<(), ResourceError> {
        let pin = self.cfg.pin(perch);
        let dir = self.line_dir(pin);
        let fail = |reason: String| ResourceError::Sensor { perch, reason };

        if !dir.exists() {
            fs::write(self.cfg.sysfs_root.join("export"), pin.to_string())
                .map_err(|e| fail(format!("export of GPIO {pin} failed: {e}")))?;
            self.lock_exported().push(pin);
            wait_for(&dir.join("direction"));
        }
        fs::write(dir.join("direction"), "in")
            .map_err(|e| fail(format!("setting GPIO {pin} as input failed: {e}")))?;
        debug!(perch = %perch, pin, "configured input");
        Ok(())
    }

    fn lock_exported(&self) -> std::sync::MutexGuard<'_, Vec<u32>> {
        self.exported.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn unexport_all(&self) -> Result<(), ResourceError> {
        let pins: Vec<u32> = self.lock_exported().drain(..).collect();
        let mut result = Ok(());
        for pin in pins {
            if let Err(e) = fs::write(self.cfg.sysfs_root.join("unexport"), pin.to_string()) {
                warn!(pin, error = %e, "unexport failed");
                if result.is_ok() {
                    let perch = PerchId::ALL
                        .into_iter()
                        .find(|&p| self.cfg.pin(p) == pin)
                        .unwrap_or(PerchId::One);
                    result = Err(ResourceError::Sensor {
                        perch,
                        reason: format!("unexport of GPIO {pin} failed: {e}"),
                    });
                }
            }
        }
        result
    }
}

impl SensorPort for SysfsSensor {
    fn read(&self, perch: PerchId) -> Result<Presence, ResourceError> {
        let pin = self.cfg.pin(perch);
        let raw = fs::read_to_string(self.line_dir(pin).join("value")).map_err(|e| {
            ResourceError::Sensor {
                perch,
                reason: format!("reading GPIO {pin} failed: {e}"),
            }
        })?;
        let low = match raw.trim() {
            "0" => true,
            "1" => false,
            other => {
                return Err(ResourceError::Sensor {
                    perch,
                    reason: format!("unexpected GPIO {pin} value {other:?}"),
                })
            }
        };
        Ok(if low == self.cfg.active_low {
            Presence::Present
        } else {
            Presence::Clear
        })
    }

    fn release(&self) -> Result<(), ResourceError> {
        self.unexport_all()
    }
}

impl Drop for SysfsSensor {
    fn drop(&mut self) {
        let _ = self.unexport_all();
    }
}

/// udev needs a moment to create the line's attribute files after export.
fn wait_for(path: &Path) {
    for _ in 0..20 {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
