use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{error, info, instrument, warn};

use crate::db;
use crate::error::AppError;

/// Preferred info file name inside each client directory.
const INFO_FILE: &str = "infos.txt";

static NAME_SANITIZER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9 _-]").unwrap());

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct SyncOutcome {
    pub processed: usize,
    pub errors: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub email: String,
    pub password: String,
}

/// Extracts credentials from a loosely formatted info file: any line
/// containing `identifiant` (case-insensitive) carries the email after the
/// colon, any line containing `mdp` carries the password.
pub fn parse_info_file(content: &str) -> ClientInfo {
    let mut info = ClientInfo::default();

    for line in content.lines() {
        let lowered = line.to_lowercase();
        if let Some((_, value)) = line.split_once(':') {
            if lowered.contains("identifiant") {
                info.email = value.trim().to_string();
            }
            if lowered.contains("mdp") {
                info.password = value.trim().to_string();
            }
        }
    }

    info
}

fn locate_info_file(folder: &Path) -> Option<PathBuf> {
    let preferred = folder.join(INFO_FILE);
    if preferred.exists() {
        return Some(preferred);
    }

    // Fall back to the first .txt file, in name order for determinism.
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(folder)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Full rescan of the PDMS root: one upsert per immediate subdirectory,
/// keyed by directory name. Rows are never deleted here, so clients whose
/// directory disappeared persist until manually removed.
#[instrument(skip(pool))]
pub async fn sync_clients(pool: &Pool<Sqlite>, root: &Path) -> Result<SyncOutcome, AppError> {
    info!(root = %root.display(), "Synchronizing PDMS clients");

    let mut outcome = SyncOutcome::default();

    let mut directories: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    directories.sort();

    for folder in directories {
        let Some(name) = folder.file_name().and_then(|n| n.to_str()).map(String::from) else {
            warn!(folder = %folder.display(), "Skipping directory with non-UTF-8 name");
            outcome.errors += 1;
            continue;
        };

        let info = match locate_info_file(&folder) {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(content) => parse_info_file(&content),
                Err(e) => {
                    warn!(client = %name, error = %e, "Error reading client info file");
                    ClientInfo::default()
                }
            },
            None => ClientInfo::default(),
        };

        match db::upsert_client(
            pool,
            &name,
            &info.email,
            &info.password,
            &folder.to_string_lossy(),
        )
        .await
        {
            Ok(()) => outcome.processed += 1,
            Err(e) => {
                error!(client = %name, error = %e, "Failed to sync client");
                outcome.errors += 1;
            }
        }
    }

    info!(
        processed = outcome.processed,
        errors = outcome.errors,
        "PDMS sync finished"
    );
    Ok(outcome)
}

/// Creates a client directory and info file first, then inserts the row.
/// A database failure after the filesystem write is logged but does not roll
/// the directory back; the next sync reconciles the row.
#[instrument(skip(pool, password))]
pub async fn create_client(
    pool: &Pool<Sqlite>,
    root: &Path,
    name: &str,
    email: &str,
    password: &str,
) -> Result<PathBuf, AppError> {
    let safe_name = NAME_SANITIZER.replace_all(name, "").trim().to_string();
    if safe_name.is_empty() {
        return Err(AppError::Validation("Invalid client name".to_string()));
    }

    let folder_path = root.join(&safe_name);
    if folder_path.exists() {
        return Err(AppError::Conflict(
            "Client folder already exists".to_string(),
        ));
    }

    std::fs::create_dir_all(&folder_path)?;
    let file_content = format!("Identifiant : {}\nmdp : {}", email, password);
    std::fs::write(folder_path.join(INFO_FILE), file_content)?;

    if let Err(e) = db::insert_client(
        pool,
        &safe_name,
        email,
        password,
        &folder_path.to_string_lossy(),
    )
    .await
    {
        // Accepted desync: the filesystem write already happened and is the
        // source of truth.
        error!(client = %safe_name, error = %e, "Database insert failed after folder creation");
    }

    Ok(folder_path)
}
