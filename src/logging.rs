//! Structured JSON logging.
//!
//! Everything logs through `tracing` with target `daybook` and an `event` field
//! naming what happened. `log` records from dependencies are bridged in.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LOG_ENV;
use crate::{AppError, AppResult};

pub const DEFAULT_FILTER: &str = "daybook=info";
pub const LOG_FILE_NAME: &str = "daybook.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global stderr subscriber. Later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Installs the global subscriber with an extra JSON-lines sink at
/// `<dir>/daybook.log`. Keep the returned guard alive; dropping it flushes the
/// file writer.
pub fn init_logging_with_file(dir: &Path) -> AppResult<WorkerGuard> {
    std::fs::create_dir_all(dir).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "create_log_dir")
            .with_context("path", dir.display().to_string())
    })?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_log::LogTracer::init();
    let stderr_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr);
    let file_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| {
            AppError::new("LOGGING/ALREADY_INITIALIZED", err.to_string())
                .with_context("path", dir.join(LOG_FILE_NAME).display().to_string())
        })?;
    Ok(guard)
}
