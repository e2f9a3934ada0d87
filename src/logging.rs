//! Logging and tracing setup.
//!
//! Structured logging goes through the `tracing` ecosystem. Console output is
//! written to **stderr** so stdout stays free for the JSON result envelope a
//! caller may print.
//!
//! # Quick Start
//!
//! ```ignore
//! use vrest_reconcile::init_logging;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads RUST_LOG, defaults to info
//!     init_logging();
//!
//!     tracing::info!("reconciling");
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `vrest_reconcile=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Every HTTP exchange (method, path, status)
//! RUST_LOG=vrest_reconcile=debug ./my-tool
//!
//! # Also log each outgoing URL
//! RUST_LOG=vrest_reconcile::transport=trace ./my-tool
//! ```
//!
//! Request and response bodies are never logged; they may carry credentials.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ConnectionConfig;
use crate::error::{ReconcileError, Result};

const DEFAULT_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber<W>(filter: EnvFilter, writer: W, ansi: bool) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Initialize the default logging subscriber.
///
/// Writes to stderr, honours `RUST_LOG` and defaults to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but `default_level` is used when `RUST_LOG` is not
/// set.
///
/// # Example
///
/// ```ignore
/// use vrest_reconcile::init_logging_with_default;
///
/// fn main() {
///     init_logging_with_default("debug");
/// }
/// ```
pub fn init_logging_with_default(default_level: &str) {
    subscriber(env_filter(default_level), std::io::stderr, true).init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this does not panic when a subscriber is
/// already set, which makes it safe to call from tests.
pub fn try_init_logging() -> bool {
    subscriber(env_filter(DEFAULT_LEVEL), std::io::stderr, true)
        .try_init()
        .is_ok()
}

/// Append logs to a file instead of stderr.
///
/// This is where [`ConnectionConfig::rest_log_file`](crate::ConnectionConfig)
/// points. The file is created if missing. `RUST_LOG` still takes precedence
/// over `default_level`.
///
/// # Errors
///
/// Fails if the file cannot be opened or a subscriber is already set.
pub fn init_logging_to_file(path: impl AsRef<Path>, default_level: &str) -> Result<()> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            ReconcileError::Configuration(format!(
                "cannot open log file {}: {}",
                path.display(),
                e
            ))
        })?;

    subscriber(env_filter(default_level), Mutex::new(file), false)
        .try_init()
        .map_err(|e| ReconcileError::Configuration(format!("logging already initialized: {}", e)))
}

/// Initialize logging from connection settings.
///
/// Logs go to [`ConnectionConfig::rest_log_file`] when it is set, otherwise
/// to stderr.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init_logging_from_config(config: &ConnectionConfig, default_level: &str) -> Result<()> {
    match &config.rest_log_file {
        Some(path) => init_logging_to_file(path, default_level),
        None => subscriber(env_filter(default_level), std::io::stderr, true)
            .try_init()
            .map_err(|e| {
                ReconcileError::Configuration(format!("logging already initialized: {}", e))
            }),
    }
}
