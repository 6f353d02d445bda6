//! Logging setup
//!
//! JSON lines go to `combined.log` (everything) and `error.log` (errors
//! only). Outside production a human-readable console layer is added.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};
use wa_core::{LogConfig, RunMode};

pub const COMBINED_LOG: &str = "combined.log";
pub const ERROR_LOG: &str = "error.log";

/// Keeps the non-blocking writers flushing; hold until shutdown
pub struct LogGuards {
    _combined: WorkerGuard,
    _errors: WorkerGuard,
}

/// Ensure the log directory exists
fn prepare_dir(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log dir {}: {}", dir.display(), e))
}

/// Install the global subscriber
pub fn init(config: &LogConfig, mode: RunMode) -> anyhow::Result<LogGuards> {
    prepare_dir(&config.dir)?;

    let (combined, combined_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&config.dir, COMBINED_LOG));
    let (errors, errors_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&config.dir, ERROR_LOG));

    let console = (!mode.is_production()).then(fmt::layer);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(fmt::layer().json().with_ansi(false).with_writer(combined))
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(errors)
                .with_filter(LevelFilter::ERROR),
        )
        .with(console)
        .try_init()?;

    Ok(LogGuards {
        _combined: combined_guard,
        _errors: errors_guard,
    })
}
