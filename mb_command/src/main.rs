//! # Motherboard Command Core Simulator
//!
//! Plays an S3G job file through the command core against simulated
//! motion, toolhead and board collaborators, then prints the final status
//! snapshot as JSON on stdout.
//!
//! Ctrl-C asserts the P-Stop input. The run ends once the machine has
//! parked.

use clap::Parser;
use mb_command::config::{LoadedConfig, load_config};
use mb_command::cycle::CycleRunner;
use mb_command::sim::SimPlayback;
use mb_common::config::LogLevel;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Motherboard command core simulator
#[derive(Parser, Debug)]
#[command(name = "mb_command")]
#[command(version)]
#[command(about = "Run an S3G job through the printer command core on simulated hardware")]
struct Args {
    /// Job stream to play (S3G binary).
    stream: PathBuf,

    /// Machine file (TOML). Built-in defaults when omitted.
    #[arg(short, long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Give up after this many scheduler ticks.
    #[arg(long, default_value_t = 10_000_000)]
    max_ticks: u64,

    /// Pause once this many commands have run, then resume.
    #[arg(long, value_name = "LINE")]
    pause_at_line: Option<u32>,

    /// Pause once the platform reaches this height [mm], then resume.
    #[arg(long, value_name = "MM")]
    pause_at_z: Option<f32>,

    /// Build speed factor for accelerated moves (0.1 to 5.0).
    #[arg(long, value_name = "FACTOR", default_value_t = 1.0)]
    speed: f32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => load_config(path),
        None => Ok(LoadedConfig::default()),
    };
    let loaded = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };

    setup_tracing(&args, loaded.machine.log_level);
    info!("mb_command v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, loaded) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("mb_command shutdown complete");
}

fn run(args: &Args, loaded: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let playback = SimPlayback::open(&args.stream)
        .map_err(|e| format!("failed to read {}: {e}", args.stream.display()))?;
    info!(
        "Config OK: tools={}, tick={}µs, planner_depth={}",
        loaded.machine.tools.count, loaded.machine.cycle.tick_us, loaded.machine.motion.planner_max_depth,
    );

    let mut runner = CycleRunner::new(loaded, playback)
        .with_pause_at_line(args.pause_at_line)
        .with_pause_height(args.pause_at_z)
        .with_speed_factor(args.speed);

    let stop = runner.machine().core.stop_signal();
    let interrupt = runner.interrupt_handle();
    ctrlc::set_handler(move || {
        info!("Received interrupt, asserting P-Stop");
        stop.trigger();
        interrupt.store(true, Ordering::Release);
    })?;

    let result = runner.run(args.max_ticks);

    let stats = runner.stats();
    info!(
        cycles = stats.cycle_count,
        avg_ns = stats.avg_cycle_ns(),
        max_ns = stats.max_cycle_ns,
        bytes_read = runner.playback().position(),
        "cycle statistics"
    );
    println!("{}", serde_json::to_string_pretty(&runner.machine().core.status())?);

    let outcome = result?;
    info!(?outcome, "job ended");
    Ok(())
}

fn level(log_level: LogLevel) -> Level {
    match log_level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// Setup tracing subscriber from CLI arguments and the machine file.
/// Logs go to stderr; stdout carries the status snapshot.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        level(log_level)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
