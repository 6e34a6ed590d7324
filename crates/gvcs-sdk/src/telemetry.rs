//! Logging setup for binaries embedding graphvcs.
//!
//! Events go to stdout and, when a log directory is given, to plain-text
//! files under it that roll over daily.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{SdkError, SdkResult};

/// Log files are named `gvcs.<date>.log`.
pub const LOG_FILE_PREFIX: &str = "gvcs";

/// Rolled files kept before the oldest is deleted.
pub const MAX_LOG_FILES: usize = 5;

/// Install a global stdout subscriber filtered at `level`.
///
/// `RUST_LOG`, when set, takes precedence over `level`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(level: &str) -> SdkResult<()> {
    init_tracing_with_logs(level, None).map(|_| ())
}

/// Like [`init_tracing`], also writing every event to rolling files in
/// `logs_dir`.
///
/// File writes happen on a background thread; keep the returned guard
/// alive until exit so buffered events are flushed.
pub fn init_tracing_with_logs(
    level: &str,
    logs_dir: Option<&Path>,
) -> SdkResult<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| SdkError::Config(e.to_string()))?,
    };
    let (file_layer, guard) = match logs_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(dir)?);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| SdkError::Config(e.to_string()))?;
    Ok(guard)
}

/// A daily-rolling appender in `dir`, created if missing.
pub fn file_appender(dir: &Path) -> SdkResult<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|e| SdkError::Config(format!("{}: {e}", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_land_in_the_logs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let appender = file_appender(&logs).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(appender));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(branch = "main", "advanced branch");
        });

        let files: Vec<_> = std::fs::read_dir(&logs)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("gvcs.") && name.ends_with(".log"), "{name}");
        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert!(text.contains("advanced branch"));
        assert!(text.contains("branch=\"main\""));
    }
}
