use std::path::Path;

use rocket::fs::TempFile;
use uuid::Uuid;

use crate::error::AppError;

pub mod auth;
pub mod install;
pub mod pdms;
pub mod users;
pub mod wiki;

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

/// Copies an uploaded file into the uploads directory under a collision-free
/// name and returns the stored file name (relative to the uploads dir, which
/// is how `file_path` values are persisted and served).
pub(crate) async fn store_upload(
    file: &mut TempFile<'_>,
    uploads_dir: &Path,
) -> Result<String, AppError> {
    let stem = file.name().unwrap_or("upload");
    let extension = file
        .content_type()
        .and_then(|ct| ct.extension())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| "bin".to_string());

    let stored_name = format!("{}_{}.{}", stem, Uuid::new_v4(), extension);
    let destination = uploads_dir.join(&stored_name);
    file.copy_to(&destination).await?;

    Ok(stored_name)
}
