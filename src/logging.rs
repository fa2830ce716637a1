//! Logging initialisation.

use crate::core::ScanError;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the rolling log files.
pub const LOG_FILE_NAME: &str = "scandesk.log";

/// Installs the global tracing subscriber.
///
/// Logs go to stderr, and additionally to a daily-rolling file when
/// `log_dir` is set. The filter is taken from `RUST_LOG` and defaults to
/// `info`. The returned guard must be kept alive for the duration of the
/// program, otherwise buffered file output is lost.
///
/// # Errors
///
/// `Configuration` if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, ScanError> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                ScanError::configuration(format!(
                    "cannot create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .map_err(|e| ScanError::configuration(format!("logging already initialised: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test owns the process-wide subscriber so the order is fixed.
    #[test]
    fn test_init_logging_errors_and_single_install() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let err = init_logging(Some(&blocker.path().join("logs"))).unwrap_err();
        assert!(matches!(err, ScanError::Configuration { .. }));
        assert!(err.to_string().contains("cannot create log directory"));

        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        let guard = init_logging(Some(&log_dir)).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());

        let err = init_logging(None).unwrap_err();
        assert!(matches!(err, ScanError::Configuration { .. }));
        assert!(err.to_string().contains("already initialised"));
    }
}
