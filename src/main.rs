//! Pulse rate estimation from recorded hue traces.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use rppg_pulse::{
    config::{Config, EXAMPLE_CONFIG},
    replay,
    sink::{CsvSink, RecordSink},
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate pulse rates from a recorded trace (CSV: timestamp,value)
    Replay {
        /// Trace file to replay
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write pulse records (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to configuration file (YAML format)
        #[arg(short = 'C', long)]
        config: Option<PathBuf>,

        /// Enable debug output
        #[arg(short, long)]
        debug: bool,
    },
    /// Print or write the example configuration
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let debug = matches!(args.command, Command::Replay { debug: true, .. });
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(if debug { "debug" } else { "info" }));

    match args.command {
        Command::Replay {
            input,
            output,
            config,
            debug: _,
        } => run_replay(&input, output, config),
        Command::Config { output } => {
            if let Some(path) = output {
                std::fs::write(&path, EXAMPLE_CONFIG)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Example configuration written to {}", path.display());
            } else {
                print!("{EXAMPLE_CONFIG}");
            }
            Ok(())
        }
    }
}

fn run_replay(input: &Path, output: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    info!("rPPG pulse estimation - trace replay");

    let config = if let Some(path) = &config_path {
        info!("Loading configuration from: {}", path.display());
        match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    let samples =
        replay::read_trace(input).with_context(|| format!("Failed to read trace {}", input.display()))?;

    let mut sink: Box<dyn RecordSink> = match &output {
        Some(path) => Box::new(
            CsvSink::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(CsvSink::from_writer(std::io::stdout())),
    };

    let summary = replay::run(&samples, &config, &mut *sink, Utc::now())?;

    info!(
        "{} samples, {} cycles: {} estimates, {} degenerate, {} out of band, {} failed",
        summary.samples,
        summary.cycles,
        summary.estimates.len(),
        summary.degenerate,
        summary.out_of_band,
        summary.failed
    );
    if let Some(mean) = summary.mean_bpm() {
        info!("Mean pulse rate: {mean:.1} BPM");
    } else {
        warn!("No pulse rate estimated; the trace needs at least {} samples", config.signal.window_len);
    }
    if summary.sink_failures > 0 {
        warn!("{} records could not be written", summary.sink_failures);
    }

    Ok(())
}
