//! Auxiliary session termination.
//!
//! When a drop is refused because the target database is being accessed by
//! other users, the operator may terminate those sessions and retry. This is
//! an explicit, separately invoked operation; the restore flow never calls
//! it automatically.

use std::path::Path;

use tracing::info;

use crate::config::ConnectionTarget;
use crate::errors::Result;
use crate::runner::ProcessRunner;

/// Terminates every backend connected to `database` (other than the one
/// issuing the query) via `pg_terminate_backend`, run through `psql` against
/// the maintenance database.
pub fn terminate_sessions(
    conn: &ConnectionTarget,
    database: &str,
    bin_dir: Option<&Path>,
    runner: &impl ProcessRunner,
) -> Result<()> {
    let psql = runner.resolve("psql", bin_dir)?;

    let query = format!(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = '{}' AND pid <> pg_backend_pid();",
        database
    );

    let mut args = conn.client_args();
    args.extend([
        "-d".to_string(),
        "postgres".to_string(),
        "-c".to_string(),
        query,
    ]);

    runner
        .run(&psql, &args, &conn.env_overlay())?
        .require_success("psql")?;

    info!("Terminated active sessions on '{}'.", database);
    Ok(())
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

    #[test]
    fn termination_targets_the_maintenance_database() {
        let runner = FakeRunner::new().on("psql", FakeRunner::ok());

        terminate_sessions(&conn(), "app", None, &runner).unwrap();

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        let args = &invocations[0].args;
        let d = args.iter().position(|a| a == "-d").unwrap();
        assert_eq!(args[d + 1], "postgres");
        assert!(args.iter().any(|a| a.contains("pg_terminate_backend")));
        assert!(args.iter().any(|a| a.contains("datname = 'app'")));
    }

    #[test]
    fn termination_failure_is_surfaced() {
        let runner = FakeRunner::new().on(
            "psql",
            FakeRunner::failed("psql: error: permission denied for pg_terminate_backend"),
        );

        let err = terminate_sessions(&conn(), "app", None, &runner).unwrap_err();
        assert!(matches!(err, AppError::ExternalProcessFailed { .. }));
    }
}
