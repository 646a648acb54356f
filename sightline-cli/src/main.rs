// Sightline command line interface
// Replays detection logs through the announcement pipeline and manages config files

mod replay;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sightline_spk::{create_engine, EngineKind, LogAnnouncer, SpeechChannel, TokioClock};
use sightline_wld::{FrameOrchestrator, Output, OutputMode, SightlineConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sightline")]
#[command(about = "Turns object detections into spoken announcements", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines detection log in real time
    Replay {
        /// Detection log, one frame per line
        log: PathBuf,

        /// Override the configured engine
        #[arg(long, value_enum)]
        engine: Option<EngineArg>,

        /// Send phrases to the screen-reader announcer instead of TTS
        #[arg(long)]
        screen_reader: bool,

        /// Spacing for frames without a timestamp
        #[arg(long, default_value = "100")]
        frame_interval_ms: u64,

        /// Longest to wait for speech to finish after the last frame
        #[arg(long, default_value = "10000")]
        drain_timeout_ms: u64,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Check a configuration file
    Validate {
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Native,
    Console,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Native => EngineKind::Native,
            EngineArg::Console => EngineKind::Console,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Replay {
            log,
            engine,
            screen_reader,
            frame_interval_ms,
            drain_timeout_ms,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(engine) = engine {
                config.speech.engine = engine.into();
            }
            if screen_reader {
                config.orchestrator.output_mode = OutputMode::ScreenReader;
            }
            run_replay(config, &log, frame_interval_ms, drain_timeout_ms).await?;
        }
        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            print!("{}", config.to_toml_string()?);
        }
        Commands::Validate { path } => {
            SightlineConfig::from_file(&path)
                .with_context(|| format!("{} is not a valid configuration", path.display()))?;
            println!("{} is valid", path.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sightline").join("config.toml"))
}

fn load_config(explicit: Option<&Path>) -> Result<SightlineConfig> {
    if let Some(path) = explicit {
        return SightlineConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            debug!("Using config at {}", path.display());
            SightlineConfig::from_file(&path)
                .with_context(|| format!("Failed to load {}", path.display()))
        }
        _ => Ok(SightlineConfig::default()),
    }
}

async fn run_replay(
    config: SightlineConfig,
    log: &Path,
    frame_interval_ms: u64,
    drain_timeout_ms: u64,
) -> Result<()> {
    let file = File::open(log).with_context(|| format!("Failed to open {}", log.display()))?;
    let frames = replay::read_frames(BufReader::new(file), frame_interval_ms)?;
    if frames.is_empty() {
        bail!("{} contains no frames", log.display());
    }

    let clock = Arc::new(TokioClock::new());
    let (output, channel) = match config.orchestrator.output_mode {
        OutputMode::Tts => {
            let engine = create_engine(&config.speech);
            info!("Replaying {} frames through the {} engine", frames.len(), engine.name());
            let channel = SpeechChannel::with_clock(engine, clock.clone(), config.speech.clone())?;
            (Output::Speech(channel.clone()), Some(channel))
        }
        OutputMode::ScreenReader => {
            info!("Replaying {} frames to the screen-reader announcer", frames.len());
            (Output::Announcer(Arc::new(LogAnnouncer::new())), None)
        }
    };
    let mut orchestrator = FrameOrchestrator::new(config, output, clock)?;

    let start = tokio::time::Instant::now();
    for frame in frames {
        tokio::time::sleep_until(start + Duration::from_millis(frame.at_ms)).await;
        let report = orchestrator.process_frame(frame.detections);
        if let (Some(text), Some(delivery)) = (&report.text, report.delivery) {
            println!(
                "[{:>6} ms] {:<8} {:?}: {}",
                report.now_ms,
                report.verdict.to_string(),
                delivery,
                text
            );
        }
    }

    if let Some(channel) = channel {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(drain_timeout_ms);
        while channel.in_flight().is_some() || channel.pending().is_some() {
            if tokio::time::Instant::now() >= deadline {
                orchestrator.stop_speech();
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    Ok(())
}
