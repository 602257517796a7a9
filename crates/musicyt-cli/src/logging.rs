//! Diagnostics for the command line front-end.
//!
//! Two `tracing` sinks are installed:
//! - stderr, quiet by default so it does not fight with progress output,
//!   overridable with `RUST_LOG`
//! - `musicyt-debug.log` in the log directory, appended through a
//!   non-blocking worker; a failing disk never fails a download

use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// File name of the diagnostic log.
pub const LOG_FILE_NAME: &str = "musicyt-debug.log";

/// When the diagnostic log starts a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RotationPolicy {
    /// One append-only file.
    #[default]
    Never,
    /// A new file per day.
    Daily,
    /// A new file per hour.
    Hourly,
}

impl From<RotationPolicy> for Rotation {
    fn from(policy: RotationPolicy) -> Self {
        match policy {
            RotationPolicy::Never => Self::NEVER,
            RotationPolicy::Daily => Self::DAILY,
            RotationPolicy::Hourly => Self::HOURLY,
        }
    }
}

/// How a run logs.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory holding the diagnostic log.
    pub directory: PathBuf,
    /// Level shown on stderr unless `RUST_LOG` is set.
    pub stderr_level: Level,
    /// Level written to the diagnostic log.
    pub file_level: Level,
    /// Rotation of the diagnostic log.
    pub rotation: RotationPolicy,
    /// Diagnostic log as JSON lines.
    pub json: bool,
    /// Source locations and span open/close events, for debug builds.
    pub verbose_records: bool,
}

impl LogSettings {
    /// Settings for `-v` repeated `verbose` times.
    ///
    /// Stderr shows warnings by default, then info, debug and trace; the
    /// file keeps debug records unless trace is asked for.
    pub fn for_verbosity(directory: impl Into<PathBuf>, verbose: u8) -> Self {
        let stderr_level = match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            directory: directory.into(),
            stderr_level,
            file_level: stderr_level.max(Level::DEBUG),
            rotation: RotationPolicy::Never,
            json: false,
            verbose_records: cfg!(debug_assertions),
        }
    }

    /// Set the rotation policy.
    #[must_use]
    pub const fn rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    /// Write the diagnostic log as JSON lines.
    #[must_use]
    pub const fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Path of the (unrotated) diagnostic log.
    pub fn log_file(&self) -> PathBuf {
        self.directory.join(LOG_FILE_NAME)
    }
}

/// Flushes the diagnostic log when dropped.
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit.
pub fn install(settings: &LogSettings) -> Result<LogGuard, LoggingError> {
    ensure_directory(&settings.directory)?;

    let appender = RollingFileAppender::new(
        settings.rotation.into(),
        &settings.directory,
        LOG_FILE_NAME,
    );
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let spans = if settings.verbose_records {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let file_filter = EnvFilter::new(directives(settings.file_level));
    let file = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(spans.clone());
    let file = if settings.json {
        file.json().with_filter(file_filter).boxed()
    } else {
        file.with_filter(file_filter).boxed()
    };

    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(settings.stderr_level)));
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(settings.verbose_records)
        .with_line_number(settings.verbose_records)
        .with_span_events(spans)
        .with_filter(stderr_filter);

    tracing_subscriber::registry()
        .with(file)
        .with(stderr)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;

    Ok(LogGuard { _worker: worker })
}

fn ensure_directory(directory: &Path) -> Result<(), LoggingError> {
    if directory.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(directory).map_err(|e| LoggingError::Directory {
        path: directory.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Dependencies stay at `warn`; our crates log at `level`.
fn directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,musicyt={level},musicyt_core={level}")
}

/// Logging set-up failures.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("Cannot create log directory {path}: {reason}")]
    Directory {
        /// Directory path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Another global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInstalled(String),
}
