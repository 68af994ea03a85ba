//! Logging setup for the command-line tool.
//!
//! Events go to stderr, so stdout carries only command output. When the app
//! directory is writable they are also written to a per-launch log file in
//! `<app dir>/logs`, and older launch files beyond [`MAX_LOG_FILES`] are pruned.
//!
//! The filter comes from `SOUNDALIKE_LOG`, then `RUST_LOG`, then `info`.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};

/// Maximum number of launch log files kept in the logs directory.
pub const MAX_LOG_FILES: usize = 10;
/// Environment variable holding the tracing filter directive.
pub const LOG_FILTER_ENV: &str = "SOUNDALIKE_LOG";
const LOG_FILE_PREFIX: &str = "soundalike";
const DEFAULT_FILTER: &str = "info";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error("Failed to create log file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to prune old logs in {path}: {source}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log file name: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("Failed to install tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Log to stderr and to a new launch file in the app logs directory.
///
/// Calling again after a successful init does nothing. On error nothing is
/// installed, so callers can fall back to [`init_stderr_only`].
pub fn init() -> Result<(), LoggingError> {
    if FILE_GUARD.get().is_some() {
        return Ok(());
    }
    let files = LogFiles::new(app_dirs::logs_dir()?);
    let log_path = files.create_launch_file(now_local_or_utc())?;
    files.prune(MAX_LOG_FILES)?;

    let (writer, guard) = tracing_appender::non_blocking(
        OpenOptions::new()
            .append(true)
            .open(&log_path)
            .map_err(|source| LoggingError::CreateFile {
                path: log_path.clone(),
                source,
            })?,
    );
    install(Some(writer))?;
    let _ = FILE_GUARD.set(guard);
    tracing::debug!("Writing log to {}", log_path.display());
    Ok(())
}

/// Log to stderr only.
pub fn init_stderr_only() -> Result<(), LoggingError> {
    install(None)
}

fn install(file_writer: Option<NonBlocking>) -> Result<(), LoggingError> {
    let timer = build_timer();
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_ansi(false)
            .with_timer(timer.clone())
            .with_writer(writer)
    });
    let stderr_layer = fmt::layer()
        .with_timer(timer)
        .with_writer(std::io::stderr);
    let subscriber = Registry::default()
        .with(filter_from(|key| std::env::var(key).ok()))
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Launch log files in one directory.
struct LogFiles {
    dir: PathBuf,
}

impl LogFiles {
    fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Create (or reuse) the file for a launch at `started`.
    fn create_launch_file(&self, started: OffsetDateTime) -> Result<PathBuf, LoggingError> {
        let path = self.dir.join(launch_file_name(started)?);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LoggingError::CreateFile {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Delete the oldest `.log` files until at most `keep` remain.
    fn prune(&self, keep: usize) -> Result<(), LoggingError> {
        let prune_err = |source| LoggingError::Prune {
            path: self.dir.clone(),
            source,
        };
        let mut logs: Vec<(SystemTime, PathBuf)> = fs::read_dir(&self.dir)
            .map_err(prune_err)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_log_file(path))
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, path)
            })
            .collect();
        logs.sort_by_key(|(modified, _)| *modified);
        let excess = logs.len().saturating_sub(keep);
        for (_, path) in logs.into_iter().take(excess) {
            fs::remove_file(&path).map_err(prune_err)?;
        }
        Ok(())
    }
}

fn is_log_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("log")
}

fn launch_file_name(started: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    Ok(format!("{LOG_FILE_PREFIX}_{}.log", started.format(NAME_FORMAT)?))
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// First parseable directive among `SOUNDALIKE_LOG` and `RUST_LOG`, else `info`.
fn filter_from(lookup: impl Fn(&str) -> Option<String>) -> EnvFilter {
    [LOG_FILTER_ENV, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
