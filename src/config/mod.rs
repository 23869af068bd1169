use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonConnection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonBackupOptions {
    pub database: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub retention_days: Option<u64>,
    pub dry_run: Option<bool>,
    pub bin_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRestoreOptions {
    pub target_database: Option<String>,
    pub archive_path: Option<PathBuf>,
    pub auto_confirm: Option<bool>,
    pub dry_run: Option<bool>,
    pub bin_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonConfig {
    pub connection: Option<JsonConnection>,
    pub backup: Option<JsonBackupOptions>,
    pub restore: Option<JsonRestoreOptions>,
    pub log_file: Option<PathBuf>,
}

impl RawJsonConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })
    }
}

/// Server coordinates plus credential, as forwarded to the client tools.
///
/// Opaque to the engines beyond argument/environment forwarding. The
/// password travels only through the `PGPASSWORD` environment overlay of a
/// single child-process invocation and is redacted from `Debug` output.
#[derive(Clone)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ConnectionTarget {
    /// The `-h/-p/-U` argument prefix shared by every PostgreSQL client tool.
    pub fn client_args(&self) -> Vec<String> {
        vec![
            "-h".to_string(),
            self.host.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "-U".to_string(),
            self.username.clone(),
        ]
    }

    /// Environment overlay carrying the credential to one child process.
    pub fn env_overlay(&self) -> Vec<(String, String)> {
        vec![("PGPASSWORD".to_string(), self.password.clone())]
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parameters of one backup run. Immutable once the run begins.
#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub database: String,
    pub backup_dir: PathBuf,
    pub retention_days: u64,
    pub dry_run: bool,
    pub bin_dir: Option<PathBuf>,
}

/// Parameters of one restore run. Immutable once the run begins.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub target_database: String,
    pub archive_path: PathBuf,
    pub auto_confirm: bool,
    pub dry_run: bool,
    pub bin_dir: Option<PathBuf>,
}

/// Connection details as loaded from config.json; the password may still be
/// absent at this point and is then prompted for interactively by the caller.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
}

pub fn load_connection_from_json(raw_config: &RawJsonConfig) -> Result<ConnectionSettings> {
    let conn = raw_config
        .connection
        .as_ref()
        .context("'connection' section must be set in config.json")?;

    let host = conn
        .host
        .as_ref()
        .filter(|s| !s.trim().is_empty())
        .context("connection.host must be set in config.json")?
        .clone();
    let username = conn
        .username
        .as_ref()
        .filter(|s| !s.trim().is_empty())
        .context("connection.username must be set in config.json")?
        .clone();

    Ok(ConnectionSettings {
        host,
        port: conn.port.unwrap_or(5432),
        username,
        password: conn.password.clone().filter(|s| !s.is_empty()),
    })
}

pub fn load_backup_request_from_json(raw_config: &RawJsonConfig) -> Result<BackupRequest> {
    let backup = raw_config
        .backup
        .as_ref()
        .context("'backup' section must be set in config.json for backup")?;

    let database = backup
        .database
        .as_ref()
        .context("backup.database must be set in config.json")?
        .clone();
    validate_database_name(&database)?;

    let backup_dir = backup
        .backup_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    if backup_dir.to_string_lossy().is_empty() {
        anyhow::bail!("backup.backup_dir cannot be empty in config.json.");
    }

    Ok(BackupRequest {
        database,
        backup_dir,
        retention_days: backup.retention_days.unwrap_or(30),
        dry_run: backup.dry_run.unwrap_or(false),
        bin_dir: backup.bin_dir.clone(),
    })
}

pub fn load_restore_request_from_json(raw_config: &RawJsonConfig) -> Result<RestoreRequest> {
    let restore = raw_config
        .restore
        .as_ref()
        .context("'restore' section must be set in config.json for restore")?;

    let target_database = restore
        .target_database
        .as_ref()
        .context("restore.target_database must be set in config.json")?
        .clone();
    validate_database_name(&target_database)?;

    let archive_path = restore
        .archive_path
        .as_ref()
        .context("restore.archive_path must be set in config.json")?
        .clone();
    if archive_path.to_string_lossy().trim().is_empty() {
        anyhow::bail!("restore.archive_path cannot be empty in config.json.");
    }

    Ok(RestoreRequest {
        target_database,
        archive_path,
        auto_confirm: restore.auto_confirm.unwrap_or(false),
        dry_run: restore.dry_run.unwrap_or(false),
        bin_dir: restore.bin_dir.clone(),
    })
}

fn validate_database_name(name: &str) -> Result<()> {
    if name.trim().is_empty()
        || name.contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
    {
        anyhow::bail!("Invalid database name in config: {:?}", name);
    }
    Ok(())
}
