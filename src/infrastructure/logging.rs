use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::domain::DomainError;

const LOG_FILE_PREFIX: &str = "virtual_atc";

/// Install the global subscriber: console output, plus daily JSON files when
/// `file_logging` is set.
///
/// `RUST_LOG` overrides the console filter. The returned guard flushes the
/// file writer when dropped and must live as long as the application.
/// Calling this again is harmless; the first subscriber stays installed.
pub fn init_logging(
    logs_dir: &Path,
    level: &str,
    file_logging: bool,
    max_files: u32,
) -> Result<Option<WorkerGuard>, DomainError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directive(level)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NONE)
        .with_filter(console_filter);

    let (file_layer, guard) = if file_logging {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(logs_dir, max_files)?);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(EnvFilter::new(format!("{}={}", LOG_FILE_PREFIX, level)));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            level = level,
            file_logging = file_logging,
            max_files = max_files,
            logs_dir = ?logs_dir,
            "Logging initialized"
        );
    }

    Ok(guard)
}

/// Crate logs at `level`, dependencies at warn.
fn console_directive(level: &str) -> String {
    format!("{}={},warn", LOG_FILE_PREFIX, level)
}

/// Daily-rotating appender that keeps at most `max_files` files.
fn file_appender(logs_dir: &Path, max_files: u32) -> Result<RollingFileAppender, DomainError> {
    fs::create_dir_all(logs_dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(max_files.max(1) as usize)
        .build(logs_dir)
        .map_err(|e| DomainError::Io(format!("Failed to create log file appender: {}", e)))
}
