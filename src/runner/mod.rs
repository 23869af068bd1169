//! External process invocation for the PostgreSQL client tools.
//!
//! Everything that mutates a database in this crate happens through a child
//! process (`pg_dump`, `psql`, `createdb`, `dropdb`). The [`ProcessRunner`]
//! trait is the seam between the engines and the operating system: production
//! code uses [`SystemRunner`], tests substitute a scripted fake.

use std::path::{Path, PathBuf};
use std::process::Command;

use which::which;

use crate::errors::{AppError, Result};

/// Captured outcome of a single child-process invocation.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    /// Converts a non-zero exit into the generic process failure, for call
    /// sites that have no tool-specific classification of their own.
    pub fn require_success(self, program: &str) -> Result<RunOutput> {
        if self.success {
            Ok(self)
        } else {
            Err(AppError::ExternalProcessFailed {
                program: program.to_string(),
                status: self
                    .code
                    .map(|c| format!("exit code {}", c))
                    .unwrap_or_else(|| "termination by signal".to_string()),
                stderr: self.stderr,
            })
        }
    }
}

pub trait ProcessRunner {
    /// Locates `tool` either inside `bin_dir` (when the caller supplied one)
    /// or on the default search path. Fails with `BinaryNotFound` before any
    /// invocation is attempted.
    fn resolve(&self, tool: &str, bin_dir: Option<&Path>) -> Result<PathBuf>;

    /// Spawns `program` with `args`, waits for it, and captures both output
    /// streams. `env_overlay` is applied on top of the inherited environment;
    /// the database credential travels exclusively through it, never through
    /// the argument list. A non-zero exit is reported in the returned
    /// [`RunOutput`], not as an error; no retries are performed.
    fn run(&self, program: &Path, args: &[String], env_overlay: &[(String, String)])
        -> Result<RunOutput>;
}

/// Production runner backed by `std::process::Command`.
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn resolve(&self, tool: &str, bin_dir: Option<&Path>) -> Result<PathBuf> {
        match bin_dir {
            Some(dir) => {
                let mut candidate = dir.join(tool);
                if !std::env::consts::EXE_SUFFIX.is_empty() {
                    candidate.set_extension(std::env::consts::EXE_SUFFIX.trim_start_matches('.'));
                }
                if candidate.is_file() {
                    Ok(candidate)
                } else {
                    Err(AppError::BinaryNotFound {
                        tool: tool.to_string(),
                        searched: Some(dir.to_path_buf()),
                    })
                }
            }
            None => which(tool).map_err(|_| AppError::BinaryNotFound {
                tool: tool.to_string(),
                searched: None,
            }),
        }
    }

    fn run(
        &self,
        program: &Path,
        args: &[String],
        env_overlay: &[(String, String)],
    ) -> Result<RunOutput> {
        let output = Command::new(program)
            .args(args)
            .envs(env_overlay.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()?;

        Ok(RunOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_reports_missing_tool_in_bin_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = SystemRunner
            .resolve("definitely_not_a_pg_tool", Some(dir.path()))
            .unwrap_err();
        match err {
            AppError::BinaryNotFound { tool, searched } => {
                assert_eq!(tool, "definitely_not_a_pg_tool");
                assert_eq!(searched.as_deref(), Some(dir.path()));
            }
            other => panic!("expected BinaryNotFound, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn resolve_finds_tool_inside_bin_dir() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("createdb");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        let found = SystemRunner.resolve("createdb", Some(dir.path())).unwrap();
        assert_eq!(found, tool);
    }

    #[test]
    fn resolve_reports_missing_tool_on_path() {
        let err = SystemRunner
            .resolve("definitely_not_a_pg_tool", None)
            .unwrap_err();
        assert!(matches!(err, AppError::BinaryNotFound { searched: None, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn run_captures_streams_and_exit_code() {
        let out = SystemRunner
            .run(
                Path::new("/bin/sh"),
                &["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
                &[],
            )
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");

        let err = out.require_success("sh").unwrap_err();
        assert!(matches!(err, AppError::ExternalProcessFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn run_applies_env_overlay() {
        let out = SystemRunner
            .run(
                Path::new("/bin/sh"),
                &["-c".to_string(), "printf '%s' \"$PGPASSWORD\"".to_string()],
                &[("PGPASSWORD".to_string(), "s3cret".to_string())],
            )
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "s3cret");
    }
}
