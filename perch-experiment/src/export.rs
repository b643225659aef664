use crate::error::ExportError;
use perch_core::TrialRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "perch_number",
    "interrupted_trial",
    "sound_file",
    "duration_spent",
    "visit_count",
    "total_time_on_perch",
    "experimental_condition",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Where and how the session log is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub path: PathBuf,
    pub format: ExportFormat,
}

impl Destination {
    pub fn new(path: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// `bird_<id>_<YYYYMMDD>_condition<C>.<ext>` inside `dir`.
    pub fn for_session(
        dir: &Path,
        bird_id: &str,
        date: chrono::NaiveDate,
        condition: perch_core::Condition,
        format: ExportFormat,
    ) -> Self {
        let name = format!(
            "bird_{}_{}_condition{}.{}",
            bird_id,
            date.format("%Y%m%d"),
            condition,
            format.extension()
        );
        Self::new(dir.join(name), format)
    }

    /// Overwrites the destination with the full log.
    pub fn write(&self, records: &[TrialRecord]) -> Result<(), ExportError> {
        let mut out = BufWriter::new(File::create(&self.path)?);
        match self.format {
            ExportFormat::Csv => write_csv(&mut out, records)?,
            ExportFormat::Json => serde_json::to_writer_pretty(&mut out, records)?,
        }
        out.flush()?;
        Ok(())
    }
}

pub fn write_csv<W: Write>(out: &mut W, records: &[TrialRecord]) -> std::io::Result<()> {
    writeln!(out, "{}", CSV_HEADER.join(","))?;
    for r in records {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            r.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f"),
            r.perch_number,
            if r.interrupted_trial { "True" } else { "False" },
            csv_field(r.sound_file.as_str()),
            seconds(r.duration_spent),
            r.visit_count,
            seconds(r.total_time_on_perch),
            r.experimental_condition,
        )?;
    }
    Ok(())
}

/// Seconds with a decimal point kept on whole values, so `3.0` not `3`.
fn seconds(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
