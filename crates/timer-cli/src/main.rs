//! Precise timer demo entry point.
//!
//! Runs one of the demo handlers on a drift-compensating timer for a fixed
//! duration (or until SIGINT/SIGTERM), then reports tick metrics.

mod handlers;
mod report;
mod signals;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use timer_common::config::TimerConfig;
use timer_runtime::{PreciseTimer, TickHandler, TimerBuilder};
use tracing::{info, warn};

use crate::handlers::{SensorCollector, TimeLogger, TimestampPrinter};
use crate::report::RunReport;
use crate::signals::SignalHandler;

/// Precise timer command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "precise-timer",
    about = "Drift-compensating periodic timer demos",
    version,
    long_about = None
)]
struct Args {
    /// Demo to run.
    #[command(subcommand)]
    demo: Demo,

    /// Path to a timer configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Tick interval, e.g. "500ms" (overrides config file).
    #[arg(long, short = 'i', value_parser = humantime::parse_duration, global = true)]
    interval: Option<Duration>,

    /// How long to run, e.g. "20s".
    #[arg(long, short = 'd', value_parser = humantime::parse_duration, global = true)]
    duration: Option<Duration>,

    /// Skip the simulated per-tick workload.
    #[arg(long, global = true)]
    no_work: bool,

    /// Print the final report as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Demo {
    /// Print a timestamp per tick with a cycling 0-90ms workload.
    Logger,
    /// Print a timestamp per tick with a random 10-200ms workload.
    Timestamp,
    /// Sample a simulated temperature sensor and report jitter statistics.
    Sensor,
}

impl Demo {
    fn name(self) -> &'static str {
        match self {
            Demo::Logger => "logger",
            Demo::Timestamp => "timestamp",
            Demo::Sensor => "sensor",
        }
    }

    fn default_interval(self) -> Duration {
        match self {
            Demo::Logger | Demo::Sensor => Duration::from_millis(500),
            Demo::Timestamp => Duration::from_secs(1),
        }
    }

    fn default_duration(self) -> Duration {
        match self {
            Demo::Logger => Duration::from_secs(30),
            Demo::Timestamp => Duration::from_secs(15),
            Demo::Sensor => Duration::from_secs(20),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), demo = args.demo.name(), "Starting precise timer demo");

    let mut config = load_config(&args)?;
    let interval = args
        .interval
        .or(config.interval)
        .unwrap_or_else(|| args.demo.default_interval());
    config.interval = Some(interval);
    config.validate().context("Invalid timer configuration")?;

    let duration = args.duration.unwrap_or_else(|| args.demo.default_duration());
    info!(?interval, ?duration, fault_policy = %config.fault_policy, "Configuration loaded");

    let signals = SignalHandler::new();
    let work = !args.no_work;

    let report = match args.demo {
        Demo::Logger => {
            let (report, timer) =
                run_demo(args.demo, TimeLogger::new(work), &config, duration, signals)?;
            info!(count = timer.handler().count(), "Time logger stopped");
            report
        }
        Demo::Timestamp => {
            let (report, timer) =
                run_demo(args.demo, TimestampPrinter::new(work), &config, duration, signals)?;
            info!(count = timer.handler().count(), "Timestamp printer stopped");
            report
        }
        Demo::Sensor => {
            let (report, timer) = run_demo(
                args.demo,
                SensorCollector::new(interval, work),
                &config,
                duration,
                signals,
            )?;
            let summary = timer.handler().summary();
            info!(
                samples = summary.samples,
                mean_jitter_ms = summary.mean_jitter_ms,
                temperature_mean = ?summary.temperature_mean,
                temperature_stddev = ?summary.temperature_stddev,
                "Sensor sampling stopped"
            );
            report.with_details(
                serde_json::to_value(&summary).context("Failed to serialize sensor summary")?,
            )
        }
    };

    report.log();
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    }

    Ok(())
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("precise_timer={level},timer_runtime={level},timer_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `PRECISE_TIMER_CONFIG` environment variable
/// 3. `config/default.toml` (local development)
/// 4. Built-in defaults
fn load_config(args: &Args) -> Result<TimerConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return TimerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    if let Ok(env_path) = std::env::var("PRECISE_TIMER_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from PRECISE_TIMER_CONFIG");
            return TimerConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from PRECISE_TIMER_CONFIG={env_path}")
            });
        }
        warn!(
            path = %env_path,
            "PRECISE_TIMER_CONFIG set but file does not exist, checking other locations"
        );
    }

    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return TimerConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {}", local_path.display()));
    }

    info!("No config file found, using built-in defaults");
    Ok(TimerConfig::default())
}

/// Run `handler` on a timer until `duration` elapses or a signal arrives.
///
/// Returns the report together with the stopped timer so callers can read
/// handler state.
fn run_demo<H: TickHandler>(
    demo: Demo,
    handler: H,
    config: &TimerConfig,
    duration: Duration,
    signals: SignalHandler,
) -> Result<(RunReport, PreciseTimer<H>)> {
    let timer = TimerBuilder::new(handler)
        .config(config.clone())
        .build()
        .context("Failed to build timer")?;

    let started = Instant::now();
    timer.start_configured().context("Failed to start timer")?;

    let interrupted = signals.wait_for_shutdown(duration);
    timer.stop();

    if interrupted {
        info!(signals = signals.signal_count(), "Run interrupted");
    }

    let report = RunReport::collect(
        demo.name(),
        &timer,
        started.elapsed(),
        interrupted,
        &config.metrics.percentiles,
    );
    Ok((report, timer))
}
