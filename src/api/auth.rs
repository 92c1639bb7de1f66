use rocket::State;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::db::authenticate_user;
use crate::error::AppError;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<SessionUser>,
}

/// Identity echoed back to the client, which stores it locally. There is no
/// server-side session; later requests supply the username themselves.
#[derive(Serialize, Deserialize, Debug)]
pub struct SessionUser {
    pub username: String,
    pub role: String,
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, AppError> {
    let username = login
        .username
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Missing credentials".to_string()))?;
    let password = login
        .password
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Missing credentials".to_string()))?;

    match authenticate_user(db, username, password).await? {
        Some(user) => Ok(Json(LoginResponse {
            success: true,
            user: Some(SessionUser {
                username: user.username,
                role: user.role.to_string(),
            }),
        })),
        None => Err(AppError::Authentication(
            "Invalid username or password".to_string(),
        )),
    }
}
