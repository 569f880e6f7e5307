use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, Rotation};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "feature-fuzzer";
pub const MAX_LOG_FILES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum LogSetupError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to create log directory {}", dir.display())]
    Directory {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create log file appender")]
    Appender(#[from] InitError),
    #[error("logging is already initialized")]
    AlreadyInitialized,
    #[error("failed to install the log subscriber")]
    Subscriber(#[from] TryInitError),
}

/// Where and how verbosely a fuzzing run logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    pub dir: PathBuf,
    pub file_prefix: String,
    pub max_files: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from(LOG_DIR),
            file_prefix: LOG_FILE_PREFIX.to_string(),
            max_files: MAX_LOG_FILES,
        }
    }
}

impl LogSettings {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    pub fn with_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = dir.as_ref().to_path_buf();
        self
    }

    /// `RUST_LOG` takes precedence over [`LogSettings::level`].
    pub fn filter(&self) -> Result<EnvFilter, LogSetupError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(&self.level)?),
        }
    }
}

/// Installs console and daily-rolling file logging for the process.
///
/// Console output goes to stdout with warnings and errors mirrored to
/// stderr. Fails with [`LogSetupError::AlreadyInitialized`] on a second call.
pub fn setup_logging(settings: &LogSettings) -> Result<(), LogSetupError> {
    let env_filter = settings.filter()?;

    std::fs::create_dir_all(&settings.dir).map_err(|source| LogSetupError::Directory {
        dir: settings.dir.clone(),
        source,
    })?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(&settings.file_prefix)
        .filename_suffix("log")
        .max_log_files(settings.max_files)
        .build(&settings.dir)?;

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD
        .set(guard)
        .map_err(|_| LogSetupError::AlreadyInitialized)?;

    let console_writer = std::io::stdout.and(std::io::stderr.with_max_level(Level::WARN));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .with_writer(console_writer);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        "Logging at '{}' to {}/{}.*.log",
        settings.level,
        settings.dir.display(),
        settings.file_prefix
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fresh_test_output_dir;

    #[test]
    fn defaults_point_at_workspace_logs() {
        let settings = LogSettings::new("debug");

        assert_eq!(settings.level, "debug");
        assert_eq!(settings.dir, PathBuf::from("logs"));
        assert_eq!(settings.file_prefix, "feature-fuzzer");
        assert_eq!(settings.max_files, 5);
    }

    #[test]
    fn logging_installs_once() {
        let dir = fresh_test_output_dir("log_setup").join("logs");
        let settings = LogSettings::new("info").with_dir(&dir);

        setup_logging(&settings).unwrap();
        assert!(dir.is_dir());

        assert!(matches!(
            setup_logging(&settings),
            Err(LogSetupError::AlreadyInitialized)
        ));
    }
}
