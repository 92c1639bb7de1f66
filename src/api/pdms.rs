use rocket::State;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::config::AppConfig;
use crate::db::list_clients;
use crate::error::AppError;
use crate::models::Client;
use crate::pdms::{SyncOutcome, create_client, sync_clients};

#[get("/pdms/clients")]
pub async fn api_get_clients(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<Client>>, AppError> {
    Ok(Json(list_clients(db).await?))
}

#[derive(Deserialize)]
pub struct CreateClientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CreateClientResponse {
    pub success: bool,
    pub path: String,
}

#[post("/pdms/clients", data = "<request>")]
pub async fn api_create_client(
    request: Json<CreateClientRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<CreateClientResponse>, AppError> {
    let name = request
        .name
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Client name is required".to_string()))?;
    let email = request.email.as_deref().unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();

    let path = create_client(db, &config.pdms_root, name, email, password).await?;

    Ok(Json(CreateClientResponse {
        success: true,
        path: path.to_string_lossy().into_owned(),
    }))
}

#[post("/pdms/sync")]
pub async fn api_sync_clients(
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<SyncOutcome>, AppError> {
    Ok(Json(sync_clients(db, &config.pdms_root).await?))
}
