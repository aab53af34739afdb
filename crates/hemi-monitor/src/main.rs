//! Real-time EEG alpha-lateralization attention monitor.
//!
//! Reads two-channel frames from a serial acquisition board (or the
//! synthetic generator), classifies attention direction per window and
//! appends the metrics log. Exit codes: 0 clean shutdown, 1 unrecoverable
//! source failure, 2 bad invocation or configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hemi_core::config::{line_freq_override, SystemConfig};
use hemi_core::HemiResult;
use hemi_stream::engine::{RealtimeEngine, RunOutcome};
use hemi_stream::sim::{SyntheticConfig, SyntheticSource};
use hemi_stream::sink::{ConsoleSink, CsvSink};
use hemi_stream::source::{FrameSource, SerialFrameSource};

/// Environment variable overriding the mains frequency (50 or 60).
const LINE_FREQ_ENV: &str = "EEG_LINE_FREQ";

#[derive(Parser, Debug)]
#[command(name = "hemi-monitor")]
#[command(author, version, about = "Real-time EEG attention direction monitor", long_about = None)]
struct Cli {
    /// Serial endpoint (e.g. /dev/ttyUSB0 or COM7); auto-detected when
    /// omitted.
    endpoint: Option<String>,

    /// Stop after this many seconds; runs until interrupted when omitted.
    #[arg(long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// JSON configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use the synthetic signal generator instead of hardware.
    #[arg(long)]
    simulate: bool,

    /// Logging verbosity: trace, debug, info, warn or error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn build_config(cli: &Cli) -> HemiResult<SystemConfig> {
    let mut config = match &cli.config {
        Some(path) => SystemConfig::from_path(path)?,
        None => SystemConfig::default(),
    };

    if let Ok(value) = std::env::var(LINE_FREQ_ENV) {
        match line_freq_override(Some(&value)) {
            Some(freq) => {
                info!(freq, "mains frequency overridden from {LINE_FREQ_ENV}");
                config.signal.notch_freq = freq;
            }
            None => warn!(%value, "ignoring {LINE_FREQ_ENV}, expected 50 or 60"),
        }
    }

    if let Some(endpoint) = &cli.endpoint {
        config.serial.port = endpoint.clone();
    }

    config.validate()?;
    Ok(config)
}

fn build_source(cli: &Cli, config: &SystemConfig) -> Box<dyn FrameSource> {
    if cli.simulate {
        info!("using synthetic source");
        Box::new(SyntheticSource::new(SyntheticConfig {
            sampling_rate: config.signal.sampling_rate,
            adc_max: config.signal.adc_max,
            noise_std: 8.0,
            paced: true,
            ..SyntheticConfig::default()
        }))
    } else {
        Box::new(SerialFrameSource::new(
            config.serial.clone(),
            config.signal.adc_max,
        ))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialize logging");
        return ExitCode::from(2);
    }

    info!("hemi-monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(%e, "configuration rejected");
            return ExitCode::from(2);
        }
    };

    let source = build_source(&cli, &config);
    let mut engine = match RealtimeEngine::new(config.clone(), source) {
        Ok(engine) => engine,
        Err(e) => {
            error!(%e, "engine construction failed");
            return ExitCode::from(2);
        }
    };

    if config.logging.enable_csv {
        let path = PathBuf::from(&config.logging.filename);
        match CsvSink::create(&path, config.logging.flush_interval_records) {
            Ok(sink) => engine.add_sink(Box::new(sink)),
            Err(e) => error!(%e, "metrics log unavailable, continuing without it"),
        }
    }
    engine.add_sink(Box::new(ConsoleSink));

    match engine.run(cli.duration) {
        RunOutcome::Completed => {
            info!("clean shutdown");
            ExitCode::SUCCESS
        }
        RunOutcome::SourceFailed { reason } => {
            error!(%reason, "terminating after source failure");
            ExitCode::from(1)
        }
    }
}
