use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use tracing::warn;

use crate::config::AppConfig;
use crate::db::{
    create_category, create_process, delete_category, delete_process, find_user_id,
    get_categories_with_processes, get_process, get_process_history, search_processes,
    try_insert_history, update_process_content, update_process_title,
};
use crate::error::AppError;
use crate::models::{Category, CategoryWithProcesses, HistoryEntry, Process};
use crate::search::build_snippet;

use super::store_upload;

#[get("/categories")]
pub async fn api_get_categories(
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CategoryWithProcesses>>, AppError> {
    Ok(Json(get_categories_with_processes(db).await?))
}

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
}

#[post("/categories", data = "<request>")]
pub async fn api_create_category(
    request: Json<CreateCategoryRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Category>, AppError> {
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Category name is required".to_string()))?;

    let id = create_category(db, name).await?;
    Ok(Json(Category {
        id,
        name: name.to_string(),
    }))
}

#[delete("/categories/<id>")]
pub async fn api_delete_category(id: i64, db: &State<Pool<Sqlite>>) -> Result<Status, AppError> {
    delete_category(db, id).await?;
    Ok(Status::Ok)
}

#[derive(FromForm)]
pub struct ProcessUploadForm<'r> {
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub author_username: Option<String>,
    pub content: Option<String>,
    pub document: Option<TempFile<'r>>,
}

#[derive(Serialize, Deserialize)]
pub struct CreateProcessResponse {
    pub success: bool,
    pub id: i64,
}

/// Multipart create: a document upload or a content string, never both. An
/// empty content string stands for a fresh article and is stored as NULL so
/// both columns start empty.
#[post("/processes", data = "<form>")]
pub async fn api_create_process(
    mut form: Form<ProcessUploadForm<'_>>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<CreateProcessResponse>, AppError> {
    let category_id = form
        .category_id
        .ok_or_else(|| AppError::Validation("Field 'category_id' is required".to_string()))?;
    let title = form
        .title
        .clone()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Field 'title' is required".to_string()))?;

    let content = form
        .content
        .clone()
        .filter(|c| !c.trim().is_empty());

    if content.is_some() && form.document.is_some() {
        return Err(AppError::Validation(
            "A process carries either a document or content, not both".to_string(),
        ));
    }

    // Unknown authors are tolerated: the process is simply created without one.
    let author_id = match form.author_username.as_deref() {
        Some(username) if !username.is_empty() => find_user_id(db, username).await?,
        _ => None,
    };

    let file_path = match form.document.as_mut() {
        Some(file) => Some(store_upload(file, &config.uploads_dir).await?),
        None => None,
    };

    let id = create_process(
        db,
        category_id,
        &title,
        content.as_deref(),
        file_path.as_deref(),
        author_id,
    )
    .await?;

    Ok(Json(CreateProcessResponse { success: true, id }))
}

#[get("/processes/<id>")]
pub async fn api_get_process(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Process>, AppError> {
    Ok(Json(get_process(db, id).await?))
}

#[derive(Deserialize)]
pub struct ProcessUpdateRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub modifier_username: Option<String>,
}

/// Partial update. A content update with a resolvable modifier appends one
/// history row; the append is best-effort and never fails the update.
#[put("/processes/<id>", data = "<update>")]
pub async fn api_update_process(
    id: i64,
    update: Json<ProcessUpdateRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    if update.title.is_none() && update.content.is_none() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }

    if let Some(title) = &update.title {
        update_process_title(db, id, title).await?;
    }

    if let Some(content) = &update.content {
        update_process_content(db, id, content).await?;

        if let Some(modifier) = update.modifier_username.as_deref().filter(|s| !s.is_empty()) {
            if let Some(user_id) = find_user_id(db, modifier).await? {
                try_insert_history(db, id, user_id).await;
            }
        }
    }

    Ok(Status::Ok)
}

#[delete("/processes/<id>")]
pub async fn api_delete_process(
    id: i64,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Status, AppError> {
    let process = get_process(db, id).await?;

    // File removal is best-effort: a missing file must not block the delete.
    if let Some(file_path) = &process.file_path {
        let full_path = config.uploads_dir.join(file_path);
        if let Err(e) = std::fs::remove_file(&full_path) {
            warn!(path = %full_path.display(), error = %e, "Could not remove uploaded file");
        }
    }

    delete_process(db, id).await?;
    Ok(Status::Ok)
}

#[get("/processes/<id>/history")]
pub async fn api_get_process_history(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    Ok(Json(get_process_history(db, id).await?))
}

#[derive(Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
    pub file_path: Option<String>,
    pub category_name: Option<String>,
    pub snippet: Option<String>,
}

#[get("/search?<q>")]
pub async fn api_search(
    q: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SearchResult>>, AppError> {
    let query = q.map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let rows = search_processes(db, query).await?;

    let results = rows
        .into_iter()
        .map(|row| {
            let snippet = row
                .content
                .as_deref()
                .and_then(|content| build_snippet(content, query));
            SearchResult {
                id: row.id,
                title: row.title,
                file_path: row.file_path,
                category_name: row.category_name,
                snippet,
            }
        })
        .collect();

    Ok(Json(results))
}
