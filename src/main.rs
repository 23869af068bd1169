//! PostgreSQL Backup/Restore Tool
//!
//! Drives the PostgreSQL client tools (pg_dump, psql, createdb, dropdb) to
//! back a database up into a compressed archive and restore it back.

mod archive;
mod backup;
mod config;
mod errors;
mod logging;
mod restore;
mod runner;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use config::{ConnectionTarget, RawJsonConfig};
use restore::RestoreOutcome;
use runner::SystemRunner;

fn main() -> ExitCode {
    match run_app() {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_app() -> Result<()> {
    // Expects config.json in the same directory as the executable or in the
    // project root when running with `cargo run`.
    let config_path = PathBuf::from("config.json");
    let raw_config = RawJsonConfig::load_from_json(&config_path).context(format!(
        "Failed to load application configuration from {}",
        config_path.display()
    ))?;

    let log_file = raw_config
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(logging::DEFAULT_LOG_FILE));
    logging::init(&log_file)?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    let settings = config::load_connection_from_json(&raw_config)?;
    let password = match settings.password {
        Some(password) => password,
        None => rpassword::prompt_password("Database password: ")
            .context("Failed to read database password")?,
    };
    let conn = ConnectionTarget {
        host: settings.host,
        port: settings.port,
        username: settings.username,
        password,
    };

    let runner = SystemRunner;

    match choice.as_str() {
        "1" | "backup" => {
            println!("🚀 Starting Backup Process...");
            let request = config::load_backup_request_from_json(&raw_config)
                .context("Failed to load backup configuration from JSON")?;
            match backup::run_backup(&conn, &request, &runner).context("Backup process failed")? {
                Some(archive_path) => println!("Backup saved: {}", archive_path.display()),
                None => println!("[DRY-RUN] No changes were made."),
            }
        }
        "2" | "restore" => {
            println!("🔄 Starting Restore Process...");
            let request = config::load_restore_request_from_json(&raw_config)
                .context("Failed to load restore configuration from JSON")?;
            println!(
                "Restore target: {}, Archive: {}",
                request.target_database,
                request.archive_path.display()
            );
            match restore::run_restore(&conn, &request, &runner)
                .context("Restore process failed")?
            {
                RestoreOutcome::Completed => println!("Restore completed successfully."),
                RestoreOutcome::Cancelled => println!(
                    "Restore cancelled: database '{}' already exists and auto_confirm is not set.",
                    request.target_database
                ),
            }
        }
        "3" | "terminate-sessions" => {
            println!("⚙️ Terminating active sessions on the restore target...");
            let request = config::load_restore_request_from_json(&raw_config)
                .context("Failed to load restore configuration from JSON")?;
            restore::terminate_sessions(
                &conn,
                &request.target_database,
                request.bin_dir.as_deref(),
                &runner,
            )
            .context("Session termination failed")?;
        }
        _ => {
            println!("❌ Invalid choice. Please enter '1' (backup), '2' (restore), or '3' (terminate-sessions).");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Prompts user to select an operation; returns the choice as String.
fn prompt_choice() -> Result<String> {
    use std::io::{stdin, stdout, Write};

    println!("Select an operation:");
    println!("1. Take Backup (or type 'backup')");
    println!("2. Restore Backup (or type 'restore')");
    println!("3. Terminate Sessions on Restore Target (or type 'terminate-sessions')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
