use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::ADMIN_USERNAME;

use super::schema::CURRENT_SCHEMA;

/// Password the default admin account is provisioned with. Operators are
/// expected to change it after first login.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, Serialize)]
pub struct PrerequisiteCheck {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct InstallStatus {
    pub success: bool,
    pub installed: bool,
    pub checks: Vec<PrerequisiteCheck>,
}

/// Filesystem probes for the install wizard's first step. Each check carries
/// its own pass/fail reason so the UI can report them individually.
pub fn check_prerequisites(config: &AppConfig) -> InstallStatus {
    let checks = vec![
        write_probe("data_dir_writable", &config.data_dir),
        write_probe("uploads_dir_writable", &config.uploads_dir),
        directory_probe("pdms_root_reachable", &config.pdms_root),
    ];

    InstallStatus {
        success: checks.iter().all(|c| c.ok),
        installed: config.is_installed(),
        checks,
    }
}

fn write_probe(name: &'static str, dir: &Path) -> PrerequisiteCheck {
    let probe = dir.join(".write_probe");
    let result = std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::write(&probe, b"probe"))
        .and_then(|_| std::fs::remove_file(&probe));

    match result {
        Ok(()) => PrerequisiteCheck {
            name,
            ok: true,
            detail: format!("{} is writable", dir.display()),
        },
        Err(e) => PrerequisiteCheck {
            name,
            ok: false,
            detail: format!("{}: {}", dir.display(), e),
        },
    }
}

fn directory_probe(name: &'static str, dir: &Path) -> PrerequisiteCheck {
    match std::fs::read_dir(dir) {
        Ok(_) => PrerequisiteCheck {
            name,
            ok: true,
            detail: format!("{} is readable", dir.display()),
        },
        Err(e) => PrerequisiteCheck {
            name,
            ok: false,
            detail: format!("{}: {}", dir.display(), e),
        },
    }
}

/// Opens a connection with the supplied URL and immediately closes it.
#[instrument]
pub async fn test_connection(database_url: &str) -> Result<(), AppError> {
    info!("Testing database connection");
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Validation(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true);

    let conn = SqliteConnection::connect_with(&options).await?;
    conn.close().await?;
    Ok(())
}

/// Idempotent schema provisioning: `CREATE TABLE IF NOT EXISTS` for every
/// table, then the default admin via `INSERT OR IGNORE`. Not transactional;
/// a mid-run failure leaves a partial schema and no lock file.
#[instrument(skip(pool))]
pub async fn provision_schema(pool: &SqlitePool) -> Result<(), AppError> {
    info!("Provisioning database schema");
    sqlx::raw_sql(CURRENT_SCHEMA).execute(pool).await?;

    let hashed = bcrypt::hash(DEFAULT_ADMIN_PASSWORD, bcrypt::DEFAULT_COST)?;
    sqlx::query("INSERT OR IGNORE INTO users (username, password, role) VALUES (?, ?, 'admin')")
        .bind(ADMIN_USERNAME)
        .bind(hashed)
        .execute(pool)
        .await?;

    Ok(())
}

/// Full install run: create the database if absent, provision the schema and
/// default admin, write the credentials file, then the lock file that gates
/// any future run.
#[instrument(skip(config))]
pub async fn run_install(config: &AppConfig, database_url: &str) -> Result<(), AppError> {
    if config.is_installed() {
        return Err(AppError::Conflict(
            "Installation already completed".to_string(),
        ));
    }

    info!(database_url = %database_url, "Running installation");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Validation(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    provision_schema(&pool).await?;
    pool.close().await;

    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::write(
        config.credentials_file(),
        format!("DATABASE_URL={}\n", database_url),
    )?;
    std::fs::write(
        config.lock_file(),
        format!("installed_at={}\n", Utc::now().to_rfc3339()),
    )?;

    info!("Installation completed");
    Ok(())
}
