//! Tracing setup for the launcher binaries.
//!
//! Console output goes to stderr and honours `RUST_LOG`. With a log
//! directory, each session also writes a plain-text file
//! `session-<timestamp>.log` through a non-blocking writer.

use std::fs;
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the session log writer alive. Dropping it flushes the file.
#[derive(Debug, Default)]
pub struct LogSession {
    file: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl LogSession {
    /// Path of the session log file, when one is written.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// Default filter directive: `info`, or `debug` when verbose.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// File name of a session log started now.
pub fn session_file_name() -> String {
    format!("session-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S"))
}

/// Install the global subscriber. Calling it twice keeps the first one.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> LogSession {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(offset, Rfc3339);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(timer.clone());

    let mut session = LogSession::default();
    let file_layer = log_dir.and_then(|dir| match fs::create_dir_all(dir) {
        Ok(()) => {
            let name = session_file_name();
            let appender = tracing_appender::rolling::never(dir, &name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            session.file = Some(dir.join(name));
            session._guard = Some(guard);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_timer(timer)
                    .with_writer(writer),
            )
        }
        Err(e) => {
            eprintln!("Cannot create log directory {}: {}", dir.display(), e);
            None
        }
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init();

    session
}
