//! Age-based deletion of old archives for one database.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::archive::ARCHIVE_EXTENSION;

/// Deletes archives named `{database}_*.tar.gz` in `backup_dir` whose
/// modification time is older than `retention_days`.
///
/// Per-file outcomes are logged; an individual deletion error never aborts
/// the sweep or the backup that invoked it.
pub fn cleanup_old_backups(database: &str, backup_dir: &Path, retention_days: u64) {
    info!(
        "Starting cleanup of backups older than {} days for database '{}' in '{}'",
        retention_days,
        database,
        backup_dir.display()
    );

    let cutoff = SystemTime::now() - Duration::from_secs(retention_days * 86_400);
    let prefix = format!("{}_", database);
    let suffix = format!(".{}", ARCHIVE_EXTENSION);

    let entries = match fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Could not scan backup directory {}: {}",
                backup_dir.display(),
                e
            );
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) || !name.ends_with(&suffix) {
            continue;
        }

        let path = entry.path();
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(e) => {
                warn!("Could not read mtime of {}: {}", path.display(), e);
                continue;
            }
        };

        if modified < cutoff {
            match fs::remove_file(&path) {
                Ok(()) => info!("Deleted old backup: {}", path.display()),
                Err(e) => warn!("Error deleting old backup {}: {}", path.display(), e),
            }
        }
    }
}
