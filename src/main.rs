use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use perch_core::{Condition, PerchId};
use perch_experiment::{
    CancelToken, Destination, ExportFormat, Rig, Scheduler, SessionRecorder,
};
use perch_timing::HighPrecisionTimer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod check;
mod config;
mod gpio;
mod prompt;
mod signal;
mod telemetry;

use audio::{DirectoryCatalog, ExternalPlayer};
use config::RigConfig;
use gpio::SysfsSensor;

#[derive(Parser)]
#[command(author, version, about = "Two-perch playback preference rig")]
struct Cli {
    /// JSON rig configuration; built-in defaults apply when omitted
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor both perches until interrupted, then export the session
    Run(RunArgs),
    /// Break each beam once to verify sensors and speakers
    Check,
}

#[derive(Args)]
struct RunArgs {
    /// Subject identifier; prompted for when omitted
    #[arg(long)]
    bird: Option<String>,

    /// Counterbalancing condition (A or B); prompted for when omitted
    #[arg(long)]
    condition: Option<Condition>,

    /// Directory for the session file, overriding the config
    #[arg(long, value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for ExportFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Csv => ExportFormat::Csv,
            Format::Json => ExportFormat::Json,
        }
    }
}

fn open_rig(cfg: &RigConfig) -> Result<Rig> {
    let sensor = SysfsSensor::open(&cfg.gpio).context("opening perch sensors")?;
    Ok(Rig::new(
        Arc::new(sensor),
        Arc::new(ExternalPlayer::new(&cfg.audio)),
        Arc::new(DirectoryCatalog::new(&cfg.audio)),
    ))
}

fn run_session(mut cfg: RigConfig, args: RunArgs) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let bird = match args.bird {
        Some(b) => b,
        None => prompt::bird_id(&mut input, &mut output)?,
    };
    let condition = match args.condition {
        Some(c) => c,
        None => prompt::condition(&mut input, &mut output)?,
    };
    drop(input);
    if let Some(dir) = args.output_dir {
        cfg.output_dir = dir;
    }

    info!(bird = %bird, condition = %condition, "bird assigned to experimental condition");
    for c in [Condition::A, Condition::B] {
        info!("Condition {}: {}", c, c.describe());
    }

    let destination = Destination::for_session(
        &cfg.output_dir,
        &bird,
        chrono::Local::now().date_naive(),
        condition,
        args.format.into(),
    );
    let recorder = if cfg.experiment.flush_every_trial {
        SessionRecorder::with_autosave(destination.clone())
    } else {
        SessionRecorder::new()
    };

    // before the rig opens, so an early Ctrl-C still unexports the lines
    signal::install().context("installing signal handlers")?;
    let rig = open_rig(&cfg)?;
    let scheduler = Scheduler::new(
        cfg.experiment.clone(),
        Some(condition),
        rig,
        HighPrecisionTimer::new(),
        StdRng::from_os_rng(),
        recorder,
    );
    let cancel = scheduler.cancel_token();
    let watcher = signal::forward_to(cancel.clone());

    let result = scheduler.run(Some(&destination));
    cancel.cancel();
    let _ = watcher.join();

    let report = result?;
    for (perch, err) in &report.failures {
        error!(perch = %perch, error = %err, "perch stopped early");
    }
    report.summarize();
    info!("test completed, GPIO cleaned up");
    Ok(())
}

fn run_check(cfg: RigConfig) -> Result<()> {
    signal::install().context("installing signal handlers")?;
    let rig = open_rig(&cfg)?;
    let cancel = CancelToken::new();
    let watcher = signal::forward_to(cancel.clone());

    let outcome = check::run(&rig, &HighPrecisionTimer::new(), &cancel);
    cancel.cancel();
    let _ = watcher.join();
    let released = rig.release();

    if outcome? {
        info!(perches = PerchId::ALL.len(), "all perches responded");
    }
    released?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing()?;
    let cfg = RigConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => run_session(cfg, args),
        Command::Check => run_check(cfg),
    }
}
