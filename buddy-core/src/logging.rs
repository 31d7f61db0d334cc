//! Logging infrastructure for buddy
//!
//! Logs are written to `~/.local/state/buddy/buddy.YYYY-MM-DD.log` following
//! XDG standards, one file per UTC day.
//! stdout is reserved for the event stream, so nothing is logged there.

use crate::config::{Config, LoggingConfig};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_PREFIX: &str = "buddy";
const LOG_FILE_SUFFIX: &str = "log";

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory
/// - Daily rotation, keeping at most `max_files` files
/// - Configurable log level via config or RUST_LOG env var
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| crate::error::Error::Config(format!("failed to create log file: {}", e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (logs to the test writer)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Directory holding the rotated log files
pub fn log_dir() -> PathBuf {
    Config::state_dir()
}

/// How rotated log files are named inside [`log_dir`]
pub fn log_file_pattern() -> String {
    format!("{LOG_FILE_PREFIX}.YYYY-MM-DD.{LOG_FILE_SUFFIX}")
}

/// Log file written on the given (UTC) day
pub fn log_file_path(date: NaiveDate) -> PathBuf {
    log_dir().join(format!(
        "{LOG_FILE_PREFIX}.{}.{LOG_FILE_SUFFIX}",
        date.format("%Y-%m-%d")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_matches_daily_rotation() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let path = log_file_path(date);
        assert!(path.ends_with("buddy/buddy.2024-03-07.log"));
        assert_eq!(log_file_pattern(), "buddy.YYYY-MM-DD.log");
    }
}
