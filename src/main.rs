use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cogex_experiment::{SequencePolicy, TrialEngine};
use cogex_timing::MonotonicClock;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

mod app;
mod settings;
mod terminal;

use app::App;
use settings::Settings;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    Balanced,
    NoRepeat,
}

impl From<Policy> for SequencePolicy {
    fn from(p: Policy) -> Self {
        match p {
            Policy::Balanced => SequencePolicy::Balanced,
            Policy::NoRepeat => SequencePolicy::NoRepeat,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "number-recognition", version, about = "Number recognition reaction-time experiment")]
struct Cli {
    /// JSON settings file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for the trial sequence, for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum)]
    policy: Option<Policy>,
    /// Log file; overrides the settings file.
    #[arg(long)]
    log: Option<PathBuf>,
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("init tracing: {e}"))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(policy) = cli.policy {
        settings.experiment.sequence_policy = policy.into();
    }
    if let Some(log) = cli.log {
        settings.log_path = log;
    }
    init_logging(&settings.log_path)?;

    println!("=== NUMBER RECOGNITION EXPERIMENT ===");
    println!("Platform: {}", std::env::consts::OS);
    println!("Architecture: {}", std::env::consts::ARCH);

    let clock = MonotonicClock::new();
    let calibration = clock.calibrate(settings.calibration_samples);
    println!(
        "Clock resolution: {} ns (jitter {:.1} ns)",
        calibration.resolution.as_nanos(),
        calibration.jitter_ns
    );
    if !calibration.is_sub_millisecond() {
        tracing::warn!(
            max_tick_ns = calibration.max_tick.as_nanos() as u64,
            "clock does not resolve below one millisecond"
        );
    }

    let rng = match cli.seed {
        Some(seed) => {
            tracing::info!(seed, "seeded trial sequence");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    };
    let sink = app::build_sink(&settings.sinks)?;
    let engine = TrialEngine::new(settings.experiment.clone(), clock, rng, sink)
        .context("invalid experiment configuration")?;
    tracing::info!(
        trial_limit = settings.experiment.trial_limit,
        policy = ?settings.experiment.sequence_policy,
        "station started"
    );

    let alert = App::new(engine, &settings).run()?;
    if let Some(alert) = alert {
        eprintln!("Results sheet unavailable: {alert}");
        eprintln!(
            "Records were saved to {} instead.",
            settings.sinks.fallback_path.display()
        );
    }
    tracing::info!("station stopped");
    Ok(())
}
