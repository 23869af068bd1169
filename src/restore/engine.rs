//! Reconciliation state machine for restoring into a target database.
//!
//! States: `Start -> Unpacked -> {Created | Exists} -> {ReadyToLoad |
//! Cancelled | Dropping -> ReadyToLoad} -> Loaded`. Cancellation (declining
//! to replace an existing database) is a deliberate no-op outcome, not an
//! error. The transient dump extracted from the archive is owned by this
//! run and removed on every exit path.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive;
use crate::config::{ConnectionTarget, RestoreRequest};
use crate::errors::{AppError, Result};
use crate::runner::ProcessRunner;

/// Terminal outcome of a restore run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Target database exists and contains the restored data.
    Completed,
    /// Target existed and the request did not authorize replacement.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unpacked,
    Created,
    Exists,
    Dropping,
    ReadyToLoad,
    Loaded,
    Cancelled,
}

/// Tri-state outcome of an attempted database creation.
#[derive(Debug)]
enum DbCreation {
    Created,
    AlreadyExists,
    Failed(String),
}

/// The three binaries a restore needs, resolved before any mutation.
struct Toolset {
    psql: PathBuf,
    createdb: PathBuf,
    dropdb: PathBuf,
}

impl Toolset {
    fn resolve(runner: &impl ProcessRunner, bin_dir: Option<&Path>) -> Result<Toolset> {
        Ok(Toolset {
            psql: runner.resolve("psql", bin_dir)?,
            createdb: runner.resolve("createdb", bin_dir)?,
            dropdb: runner.resolve("dropdb", bin_dir)?,
        })
    }
}

/// Restores the request's archive into the target database.
///
/// Drives the reconciliation state machine described in the module docs.
/// Mutation never begins with an incomplete toolset, and an existing target
/// is only replaced when the request carries `auto_confirm`.
pub fn run_restore(
    conn: &ConnectionTarget,
    request: &RestoreRequest,
    runner: &impl ProcessRunner,
) -> Result<RestoreOutcome> {
    info!(
        "Starting restore for database '{}' from {}",
        request.target_database,
        request.archive_path.display()
    );

    if request.dry_run {
        info!(
            "[DRY-RUN] Restore would run with: host={}, port={}, target_database={}, archive={}",
            conn.host,
            conn.port,
            request.target_database,
            request.archive_path.display()
        );
        info!("[DRY-RUN] Would unpack the archive, create/replace the database, and load the dump with psql.");
        return Ok(RestoreOutcome::Completed);
    }

    // Start -> Unpacked. Failure here is fatal; nothing to clean yet.
    let work_dir = tempfile::tempdir()?;
    let dump = archive::unpack(&request.archive_path, work_dir.path())?;

    // Preflight: the full toolset must resolve before any mutation.
    let tools = Toolset::resolve(runner, request.bin_dir.as_deref())?;

    let mut state = State::Unpacked;
    let outcome = loop {
        state = match state {
            State::Unpacked => {
                match attempt_create(conn, &tools.createdb, &request.target_database, runner)? {
                    DbCreation::Created => {
                        info!("Database '{}' created.", request.target_database);
                        State::Created
                    }
                    DbCreation::AlreadyExists => {
                        info!("Database '{}' already exists.", request.target_database);
                        State::Exists
                    }
                    DbCreation::Failed(reason) => {
                        return Err(AppError::CreateFailed {
                            database: request.target_database.clone(),
                            reason,
                        });
                    }
                }
            }

            State::Exists => {
                if request.auto_confirm {
                    info!(
                        "Replacing database '{}' as auto-confirm was provided.",
                        request.target_database
                    );
                    State::Dropping
                } else {
                    State::Cancelled
                }
            }

            State::Dropping => {
                drop_database(conn, &tools.dropdb, &request.target_database, runner)?;
                info!("Database '{}' dropped.", request.target_database);

                match attempt_create(conn, &tools.createdb, &request.target_database, runner)? {
                    DbCreation::Created => {
                        info!("Database '{}' re-created.", request.target_database);
                        State::ReadyToLoad
                    }
                    DbCreation::AlreadyExists => {
                        return Err(AppError::RecreateFailed {
                            database: request.target_database.clone(),
                            reason: "database reappeared between drop and create".to_string(),
                        });
                    }
                    DbCreation::Failed(reason) => {
                        return Err(AppError::RecreateFailed {
                            database: request.target_database.clone(),
                            reason,
                        });
                    }
                }
            }

            State::Created | State::ReadyToLoad => {
                load_dump(conn, &tools.psql, &request.target_database, dump.path(), runner)?;
                State::Loaded
            }

            State::Loaded => {
                info!("Restore completed successfully.");
                break RestoreOutcome::Completed;
            }

            State::Cancelled => {
                warn!(
                    "Database '{}' already exists and auto-confirm was not given. Restore cancelled.",
                    request.target_database
                );
                break RestoreOutcome::Cancelled;
            }
        };
    };

    // `dump` and `work_dir` drop here (and on every early return above),
    // removing the transient file regardless of the branch taken.
    Ok(outcome)
}

/// Unconditional `createdb`, classified into the tri-state creation outcome.
fn attempt_create(
    conn: &ConnectionTarget,
    createdb: &Path,
    database: &str,
    runner: &impl ProcessRunner,
) -> Result<DbCreation> {
    let mut args = conn.client_args();
    args.push(database.to_string());

    let out = runner.run(createdb, &args, &conn.env_overlay())?;
    if out.success {
        Ok(DbCreation::Created)
    } else if out.stderr.contains("already exists") {
        Ok(DbCreation::AlreadyExists)
    } else {
        Ok(DbCreation::Failed(out.stderr))
    }
}

/// `dropdb`, with the access-conflict diagnostic surfaced distinctly: an
/// operator can terminate the sessions and retry, so it must not be folded
/// into the generic drop failure.
fn drop_database(
    conn: &ConnectionTarget,
    dropdb: &Path,
    database: &str,
    runner: &impl ProcessRunner,
) -> Result<()> {
    let mut args = conn.client_args();
    args.push(database.to_string());

    let out = runner.run(dropdb, &args, &conn.env_overlay())?;
    if out.success {
        Ok(())
    } else if out.stderr.contains("accessed by other users") {
        warn!("Active sessions detected on '{}'. Cannot drop.", database);
        Err(AppError::ActiveSessionsDetected(database.to_string()))
    } else {
        Err(AppError::DropFailed {
            database: database.to_string(),
            reason: out.stderr,
        })
    }
}

/// Streams the extracted dump into the target database via `psql -f`.
fn load_dump(
    conn: &ConnectionTarget,
    psql: &Path,
    database: &str,
    dump_path: &Path,
    runner: &impl ProcessRunner,
) -> Result<()> {
    info!("Restoring data into '{}'...", database);

    let mut args = conn.client_args();
    args.extend([
        "-d".to_string(),
        database.to_string(),
        "-f".to_string(),
        dump_path.display().to_string(),
    ]);

    let out = runner.run(psql, &args, &conn.env_overlay())?;
    if out.success {
        Ok(())
    } else {
        Err(AppError::LoadFailed {
            database: database.to_string(),
            reason: out.stderr,
        })
    }
}
