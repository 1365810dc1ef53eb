//! Logging setup.
//!
//! All components log through `tracing` with a bracketed component prefix
//! (`[VideoVerified]`, `[FrameAudit]`, ...). This module installs the
//! global subscriber:
//! - stderr output, filtered by `RUST_LOG` or the configured level
//! - optional non-blocking file output via `tracing-appender`
//!
//! # Example
//!
//! ```no_run
//! use vsg_framesync::logging::{init_tracing_with_file, LogLevel};
//!
//! // Keep the guard alive for the whole run so buffered lines are flushed.
//! let _guard = init_tracing_with_file(LogLevel::Info, ".logs", "framesync.log").unwrap();
//! tracing::info!("[VideoVerified] starting");
//! ```

mod types;

pub use types::LogLevel;

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(env_filter(default_level))
        .init();
}

/// Like [`init_tracing`], plus a plain-text copy of every line in
/// `dir/file_name`.
///
/// The returned guard flushes the file writer when dropped.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    dir: impl AsRef<Path>,
    file_name: &str,
) -> io::Result<WorkerGuard> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter(default_level))
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
