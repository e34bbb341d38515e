//! File logging for the terminal map.
//!
//! The TUI owns stdout, so events only go to `<log_dir>/tui-pinmap.log`,
//! truncated at session start. `RUST_LOG` overrides the default `info` filter.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "tui-pinmap.log";

/// Keep alive for the whole session; dropping it flushes the writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    pub path: PathBuf,
}

/// Create the log directory and truncate the session log
pub fn prepare_log_file(log_dir: &Path) -> Result<PathBuf, io::Error> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE);
    fs::write(&path, "")?;
    Ok(path)
}

/// Install the global subscriber. Call once, before the terminal is taken over.
pub fn init_logging(log_dir: &Path) -> Result<LoggingGuard, io::Error> {
    let path = prepare_log_file(log_dir)?;

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry().with(env_filter).with(file_layer).init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}
