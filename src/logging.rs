//! Diagnostic log sink.
//!
//! Every state transition and external-process outcome in the engines is
//! recorded through `tracing`. This module wires those events to an
//! append-only log file with timestamps and severity. Initialization is
//! explicit and process-wide; the engines themselves only emit events and
//! never configure the sink.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILE: &str = "pgarchiver.log";

/// Installs the global subscriber writing to `log_file` (append-only).
///
/// `RUST_LOG` overrides the default `info` filter. Must be called once,
/// before any engine runs.
pub fn init(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file at {}", log_file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();

    Ok(())
}
