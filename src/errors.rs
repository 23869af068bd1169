use std::path::PathBuf;
use thiserror::Error;

/// Classified failures surfaced by the backup and restore engines.
///
/// Cancellation of a restore is deliberately NOT represented here; declining
/// to replace an existing database is an informational outcome
/// (`RestoreOutcome::Cancelled`), never an error.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required binary '{tool}' not found{}", resolve_hint(.searched))]
    BinaryNotFound {
        tool: String,
        searched: Option<PathBuf>,
    },

    #[error("Archive is not a valid container: {0}")]
    ArchiveCorrupt(String),

    #[error("No dump entry (*.sql) found inside the archive")]
    NoDumpEntry,

    #[error("Failed to write archive: {0}")]
    ArchiveWriteError(String),

    #[error("Failed to create database '{database}': {reason}")]
    CreateFailed { database: String, reason: String },

    #[error("Failed to drop database '{database}': {reason}")]
    DropFailed { database: String, reason: String },

    #[error("Database '{0}' is being accessed by other users; drop refused. Terminate the active sessions and retry.")]
    ActiveSessionsDetected(String),

    #[error("Failed to re-create database '{database}' after drop: {reason}")]
    RecreateFailed { database: String, reason: String },

    #[error("Failed to load dump into database '{database}': {reason}")]
    LoadFailed { database: String, reason: String },

    #[error("Command '{program}' failed with {status}: {stderr}")]
    ExternalProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },
}

fn resolve_hint(searched: &Option<PathBuf>) -> String {
    match searched {
        Some(dir) => format!(" in '{}'", dir.display()),
        None => String::from(
            " in PATH. Please ensure PostgreSQL client tools are installed and in your PATH.",
        ),
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
