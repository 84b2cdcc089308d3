//! # Joystick Arbiter
//!
//! Reads every connected joystick and reports the most active button, hat and
//! axis, with key-repeat applied to held buttons and hats.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::time::{interval, Duration};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use joystick_arbiter::config::{Config, LoggingConfig};
use joystick_arbiter::controller::clock::MonotonicClock;
use joystick_arbiter::controller::evdev_backend::EvdevBackend;
use joystick_arbiter::controller::hat::HatDirections;
use joystick_arbiter::controller::subsystem::InputSubsystem;
use joystick_arbiter::recorder::SnapshotRecorder;

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "joystick-arbiter.log";

/// Interval between polls for a given rate
fn poll_period(rate_hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(rate_hz.max(1)))
}

/// Loads the configuration named on the command line, else the default file
/// if present, else built-in defaults
fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        return Config::load(&path).with_context(|| format!("Failed to load config from {}", path));
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return Config::load(default_path)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH));
    }

    Ok(Config::default())
}

/// Installs the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. When a log directory is set,
/// output is mirrored into a daily-rolling file; the returned guard must be
/// held until exit so buffered lines are flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.directory.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.directory, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout.and(file_writer))
        .init();
    Some(guard)
}

/// Main entry point for Joystick Arbiter
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Open every joystick through evdev
///    - Register the snapshot recorder if enabled
///
/// 2. **Main Loop**
///    - Poll all devices at the configured rate
///    - Log repeat-filtered button and hat activations
///    - Log changes of the most active axis
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C disables input, releasing every device
///
/// # Errors
///
/// Returns error if the configuration is invalid or the recorder file cannot
/// be opened.
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = init_logging(&config.logging);

    info!("Joystick Arbiter v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut input = InputSubsystem::new(EvdevBackend::new(), MonotonicClock::new(), config.input_settings());

    if config.recorder.enabled {
        let recorder = SnapshotRecorder::create(&config.recorder.path, config.recorder.min_interval_ms)
            .with_context(|| format!("Failed to open recorder file {}", config.recorder.path))?;
        input.set_consumer(Box::new(recorder));
    }

    input.set_enabled(config.input.enabled);
    info!("{} joystick(s) available", input.devices().len());
    for (index, name, _) in input.devices().opened() {
        info!("  [{}] {}", index, name);
    }

    let mut poll_interval = interval(poll_period(config.polling.rate_hz));

    info!("Polling at {}Hz", config.polling.rate_hz);
    info!("Press Ctrl+C to exit");

    let mut poll_count: u64 = 0;
    let mut last_axis = None;

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                input.update();
                poll_count += 1;

                if let Some(button) = input.button(true) {
                    info!("Button {} active", button);
                }

                if let Some((hat, position)) = input.hat(true) {
                    info!("Hat {} active: {:?}", hat, HatDirections::from_raw(position));
                }

                let axis = input.axis();
                if axis != last_axis {
                    match axis {
                        Some(id) => info!("Axis {} most active ({:.2})", id, input.amount(id)),
                        None => debug!("All axes at rest"),
                    }
                    last_axis = axis;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                input.set_enabled(false);
                info!("Total polls: {}", poll_count);
                break;
            }
        }
    }

    Ok(())
}
