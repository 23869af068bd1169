//! Archive codec: one compressed container, one textual dump entry.
//!
//! Backups are gzip-compressed tar files holding exactly one `.sql` dump,
//! stored under its base name. The restore side locates and extracts that
//! single entry; it does not validate dump content.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};

use crate::errors::{AppError, Result};

/// File extension of the dump entry inside an archive.
pub const DUMP_EXTENSION: &str = "sql";

/// File extension of the archive container itself.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// A dump file owned exclusively by the current operation.
///
/// Removal is bound to `Drop`, so the file disappears on every exit path of
/// the owning run (success, cancellation, or error) without the caller
/// remembering a cleanup step.
#[derive(Debug)]
pub struct TransientDump {
    path: PathBuf,
}

impl TransientDump {
    pub fn new(path: PathBuf) -> Self {
        TransientDump { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientDump {
    fn drop(&mut self) {
        if self.path.exists() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => info!("Cleaned up temporary file: {}", self.path.display()),
                Err(e) => warn!(
                    "Failed to remove temporary file {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

/// Packs a single dump file into a new gzip tar archive at `dest_archive`.
///
/// The entry is stored under the source file's base name.
pub fn pack(source_file: &Path, dest_archive: &Path) -> Result<()> {
    info!(
        "Compressing {} into {}",
        source_file.display(),
        dest_archive.display()
    );

    let entry_name = source_file
        .file_name()
        .ok_or_else(|| AppError::ArchiveWriteError(format!(
            "dump path has no file name: {}",
            source_file.display()
        )))?
        .to_owned();

    let archive_file = File::create(dest_archive)
        .map_err(|e| AppError::ArchiveWriteError(format!(
            "failed to create {}: {}",
            dest_archive.display(),
            e
        )))?;
    let enc = GzEncoder::new(archive_file, Compression::default());
    let mut builder = tar::Builder::new(enc);

    builder
        .append_path_with_name(source_file, entry_name)
        .map_err(|e| AppError::ArchiveWriteError(format!(
            "failed to append {}: {}",
            source_file.display(),
            e
        )))?;

    let enc = builder
        .into_inner()
        .map_err(|e| AppError::ArchiveWriteError(e.to_string()))?;
    enc.finish()
        .map_err(|e| AppError::ArchiveWriteError(e.to_string()))?;

    info!("Archive created: {}", dest_archive.display());
    Ok(())
}

/// Opens `archive`, locates the dump entry, and extracts it into `dest_dir`.
///
/// Selection rule: the first entry (in container order) whose name ends in
/// `.sql` is used. With multiple qualifying entries the container's
/// enumeration order decides, which is not a stable contract; producing
/// archives with exactly one dump entry is the caller's responsibility.
///
/// Fails with `ArchiveCorrupt` if the container is structurally invalid and
/// `NoDumpEntry` if no qualifying entry exists.
pub fn unpack(archive: &Path, dest_dir: &Path) -> Result<TransientDump> {
    info!("Unpacking {}", archive.display());

    let archive_file = File::open(archive)?;
    let decoder = GzDecoder::new(archive_file);
    let mut container = tar::Archive::new(decoder);

    let entries = container
        .entries()
        .map_err(|e| AppError::ArchiveCorrupt(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| AppError::ArchiveCorrupt(e.to_string()))?;
        let entry_path = entry
            .path()
            .map_err(|e| AppError::ArchiveCorrupt(e.to_string()))?
            .into_owned();

        let is_dump = entry_path
            .extension()
            .map_or(false, |ext| ext == DUMP_EXTENSION);
        if !is_dump {
            continue;
        }

        let file_name = entry_path
            .file_name()
            .ok_or_else(|| AppError::ArchiveCorrupt("dump entry has no file name".to_string()))?
            .to_owned();
        let dest = dest_dir.join(file_name);

        entry
            .unpack(&dest)
            .map_err(|e| AppError::ArchiveCorrupt(format!(
                "failed to extract {}: {}",
                entry_path.display(),
                e
            )))?;

        info!("Extracted dump entry: {}", dest.display());
        return Ok(TransientDump::new(dest));
    }

    Err(AppError::NoDumpEntry)
}
