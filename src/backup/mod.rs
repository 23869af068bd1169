//! Backup engine: dump via `pg_dump`, pack, retention sweep.

pub(crate) mod retention;

use std::fs;
use std::path::PathBuf;

use chrono::Local;
use tracing::{error, info};

use crate::archive::{self, TransientDump, ARCHIVE_EXTENSION, DUMP_EXTENSION};
use crate::config::{BackupRequest, ConnectionTarget};
use crate::errors::Result;
use crate::runner::ProcessRunner;

/// Backs up one database into `{database}_{timestamp}.tar.gz` inside the
/// requested backup directory, then sweeps archives older than the retention
/// threshold. Returns the path of the new archive.
///
/// The intermediate `.sql` dump is removed on every exit path. A failure
/// during dump or packing deletes any partially written archive before the
/// error propagates.
pub fn run_backup(
    conn: &ConnectionTarget,
    request: &BackupRequest,
    runner: &impl ProcessRunner,
) -> Result<Option<PathBuf>> {
    info!(
        "Starting backup for database '{}' on {}:{}",
        request.database, conn.host, conn.port
    );

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let dump_path = request
        .backup_dir
        .join(format!("{}_{}.{}", request.database, timestamp, DUMP_EXTENSION));
    let archive_path = request
        .backup_dir
        .join(format!("{}_{}.{}", request.database, timestamp, ARCHIVE_EXTENSION));

    if request.dry_run {
        info!("[DRY-RUN] Would run pg_dump for database '{}'", request.database);
        info!("[DRY-RUN] Would create dump at: {}", dump_path.display());
        info!("[DRY-RUN] Would create archive at: {}", archive_path.display());
        info!(
            "[DRY-RUN] Would delete backups older than {} days in {}",
            request.retention_days,
            request.backup_dir.display()
        );
        return Ok(None);
    }

    let pg_dump = runner.resolve("pg_dump", request.bin_dir.as_deref())?;

    fs::create_dir_all(&request.backup_dir)?;

    // Owns the intermediate dump for the rest of this run.
    let dump = TransientDump::new(dump_path);

    let mut args = conn.client_args();
    args.extend([
        "-d".to_string(),
        request.database.clone(),
        "-f".to_string(),
        dump.path().display().to_string(),
    ]);

    runner
        .run(&pg_dump, &args, &conn.env_overlay())?
        .require_success("pg_dump")?;
    info!("Database dump created: {}", dump.path().display());

    if let Err(e) = archive::pack(dump.path(), &archive_path) {
        if archive_path.exists() {
            match fs::remove_file(&archive_path) {
                Ok(()) => info!(
                    "Cleaned up incomplete archive: {}",
                    archive_path.display()
                ),
                Err(rm) => error!(
                    "Failed to remove incomplete archive {}: {}",
                    archive_path.display(),
                    rm
                ),
            }
        }
        return Err(e);
    }
    info!("Backup saved successfully: {}", archive_path.display());

    retention::cleanup_old_backups(&request.database, &request.backup_dir, request.retention_days);

    Ok(Some(archive_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::runner::testing::FakeRunner;

    fn conn() -> ConnectionTarget {
        ConnectionTarget {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "secret".to_string(),
        }
    }

    fn request(dir: &std::path::Path) -> BackupRequest {
        BackupRequest {
            database: "app".to_string(),
            backup_dir: dir.to_path_buf(),
            retention_days: 30,
            dry_run: false,
            bin_dir: None,
        }
    }

    #[test]
    fn backup_dumps_packs_and_removes_transient_dump() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().on_writing_dump("pg_dump", FakeRunner::ok());

        let archive = run_backup(&conn(), &request(dir.path()), &runner)
            .unwrap()
            .expect("archive path");

        assert!(archive.exists());
        assert!(archive
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("app_"));
        // only the archive remains; the .sql dump was transient
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".sql"))
            .collect();
        assert!(leftovers.is_empty(), "dump left behind: {:?}", leftovers);
    }

    #[test]
    fn backup_passes_credential_only_through_environment() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().on_writing_dump("pg_dump", FakeRunner::ok());

        run_backup(&conn(), &request(dir.path()), &runner).unwrap();

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        let pg_dump = &invocations[0];
        assert_eq!(pg_dump.tool, "pg_dump");
        assert!(!pg_dump.args.iter().any(|a| a.contains("secret")));
        assert!(pg_dump
            .env
            .contains(&("PGPASSWORD".to_string(), "secret".to_string())));
    }

    #[test]
    fn backup_fails_fast_when_pg_dump_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().without_tool("pg_dump");

        let err = run_backup(&conn(), &request(dir.path()), &runner).unwrap_err();
        assert!(matches!(err, AppError::BinaryNotFound { .. }));
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn backup_dump_failure_propagates_and_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().on(
            "pg_dump",
            FakeRunner::failed("pg_dump: error: connection refused"),
        );

        let err = run_backup(&conn(), &request(dir.path()), &runner).unwrap_err();
        match err {
            AppError::ExternalProcessFailed { program, stderr, .. } => {
                assert_eq!(program, "pg_dump");
                assert!(stderr.contains("connection refused"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn dry_run_invokes_nothing_and_touches_nothing() {
        let parent = tempfile::tempdir().unwrap();
        let backup_dir = parent.path().join("backups");
        let runner = FakeRunner::new().without_tool("pg_dump");

        let mut req = request(&backup_dir);
        req.dry_run = true;

        // succeeds even though pg_dump is unresolvable: nothing is resolved
        let result = run_backup(&conn(), &req, &runner).unwrap();
        assert!(result.is_none());
        assert!(runner.invocations().is_empty());
        assert!(!backup_dir.exists());
    }
}
