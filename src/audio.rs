use crate::config::AudioConfig;
use perch_core::{Pan, PerchId, StimulusId};
use perch_experiment::{Playback, PlaybackHandle, ResourceError, StimulusCatalog};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Lists the stimulus files in each pool's folder.
pub struct DirectoryCatalog {
    cfg: AudioConfig,
}

impl DirectoryCatalog {
    pub fn new(cfg: &AudioConfig) -> Self {
        Self { cfg: cfg.clone() }
    }
}

impl StimulusCatalog for DirectoryCatalog {
    fn list(&self, pool: PerchId) -> Result<Vec<StimulusId>, ResourceError> {
        let folder = self.cfg.folder(pool);
        let entries = fs::read_dir(folder).map_err(|e| ResourceError::Catalog {
            pool,
            reason: format!("{}: {e}", folder.display()),
        })?;
        let mut names: Vec<StimulusId> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|x| x.to_str())
                        .is_some_and(|x| x.eq_ignore_ascii_case(&self.cfg.extension))
            })
            .filter_map(|path| path.file_name()?.to_str().map(StimulusId::new))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Plays stimuli by spawning an external player per trial.
pub struct ExternalPlayer {
    cfg: AudioConfig,
    running: Mutex<Vec<Arc<Mutex<Child>>>>,
    durations: Mutex<HashMap<PathBuf, Duration>>,
}

struct ChildHandle(Arc<Mutex<Child>>);

impl PlaybackHandle for ChildHandle {
    fn is_active(&self) -> bool {
        let mut child = lock(&self.0);
        matches!(child.try_wait(), Ok(None))
    }
}

impl ExternalPlayer {
    pub fn new(cfg: &AudioConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            running: Mutex::new(Vec::new()),
            durations: Mutex::new(HashMap::new()),
        }
    }

    fn path_of(&self, stimulus: &StimulusId, pool: PerchId) -> PathBuf {
        self.cfg.folder(pool).join(stimulus.as_str())
    }

    fn stop_all(&self) {
        let children: Vec<_> = lock(&self.running).drain(..).collect();
        for child in children {
            let mut child = lock(&child);
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl Playback for ExternalPlayer {
    fn play(
        &self,
        stimulus: &StimulusId,
        pool: PerchId,
        pan: Pan,
    ) -> Result<Box<dyn PlaybackHandle>, ResourceError> {
        let path = self.path_of(stimulus, pool);
        let args = expand_args(&self.cfg.player, &path, pan);
        let fail = |reason: String| ResourceError::Playback {
            stimulus: stimulus.to_string(),
            reason,
        };
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| fail("no player command configured".to_string()))?;
        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| fail(format!("spawning {program}: {e}")))?;
        debug!(program = %program, file = %path.display(), "player started");

        let child = Arc::new(Mutex::new(child));
        let mut running = lock(&self.running);
        running.retain(|c| matches!(lock(c).try_wait(), Ok(None)));
        running.push(Arc::clone(&child));
        Ok(Box::new(ChildHandle(child)))
    }

    fn duration_of(&self, stimulus: &StimulusId, pool: PerchId) -> Result<Duration, ResourceError> {
        let path = self.path_of(stimulus, pool);
        if let Some(d) = lock(&self.durations).get(&path) {
            return Ok(*d);
        }
        let d = wav_duration(&path).map_err(|e| ResourceError::Playback {
            stimulus: stimulus.to_string(),
            reason: format!("reading {}: {e}", path.display()),
        })?;
        lock(&self.durations).insert(path, d);
        Ok(d)
    }

    fn release(&self) -> Result<(), ResourceError> {
        self.stop_all();
        Ok(())
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

fn expand_args(template: &[String], file: &Path, pan: Pan) -> Vec<String> {
    let file = file.to_string_lossy();
    template
        .iter()
        .map(|arg| {
            arg.replace("{file}", &file)
                .replace("{left}", &pan.left.to_string())
                .replace("{right}", &pan.right.to_string())
        })
        .collect()
}

/// Length of a RIFF/WAVE file from its `fmt ` byte rate and `data` size.
pub fn wav_duration(path: &Path) -> io::Result<Duration> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut r = BufReader::new(file);
    let invalid = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_string());

    let mut riff = [0u8; 12];
    r.read_exact(&mut riff)?;
    if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
        return Err(invalid("not a RIFF/WAVE file"));
    }

    let mut byte_rate = None;
    loop {
        let mut header = [0u8; 8];
        if let Err(e) = r.read_exact(&mut header) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                return Err(invalid("no data chunk"));
            }
            return Err(e);
        }
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;
        match &header[0..4] {
            b"fmt " => {
                // only the byte rate at offset 8 is needed
                if size < 12 {
                    return Err(invalid("fmt chunk too short"));
                }
                let mut fmt = [0u8; 12];
                r.read_exact(&mut fmt)?;
                byte_rate = Some(u32::from_le_bytes([fmt[8], fmt[9], fmt[10], fmt[11]]));
                r.seek(SeekFrom::Current((size - 12 + size % 2) as i64))?;
            }
            b"data" => {
                let rate = byte_rate
                    .filter(|&b| b > 0)
                    .ok_or_else(|| invalid("data chunk before a usable fmt chunk"))?;
                let remaining = file_len.saturating_sub(r.stream_position()?);
                let size = if size == u32::MAX as u64 { remaining } else { size.min(remaining) };
                return Ok(Duration::from_secs_f64(size as f64 / rate as f64));
            }
            _ => {
                r.seek(SeekFrom::Current((size + size % 2) as i64))?;
            }
        }
    }
}
