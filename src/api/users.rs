use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::config::AppConfig;
use crate::db::{
    ProfileFields, authenticate_user, create_user, delete_user, get_all_users, get_user,
    get_user_profile, get_user_profile_by_id, update_profile_picture, update_user_password,
    update_user_profile, update_user_role, update_username,
};
use crate::error::AppError;
use crate::models::{ADMIN_USERNAME, Role, User, UserProfile};
use crate::validation::ValidateExt;
use validator::Validate;

use super::store_upload;

#[derive(Validate)]
struct CredentialRules<'a> {
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    username: &'a str,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: &'a str,
}

#[get("/users")]
pub async fn api_get_users(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(get_all_users(db).await?))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub creator_username: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub success: bool,
    pub id: i64,
}

#[post("/users", data = "<request>")]
pub async fn api_create_user(
    request: Json<CreateUserRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CreateUserResponse>, AppError> {
    let username = required(&request.username, "username")?;
    let password = required(&request.password, "password")?;
    let role_str = required(&request.role, "role")?;

    CredentialRules { username, password }.check()?;

    let role = Role::from_str(role_str).map_err(|e| AppError::Validation(e.to_string()))?;

    // Only an admin may create another admin. The creator identity is
    // client-supplied; its role is looked up server-side.
    if role.is_admin() {
        let creator = request
            .creator_username
            .as_deref()
            .ok_or_else(|| AppError::Authorization("Creator identity required".to_string()))?;
        let creator_profile = get_user_profile(db, creator).await.map_err(|_| {
            AppError::Authorization("Creator identity could not be resolved".to_string())
        })?;
        if !creator_profile.role.is_admin() {
            return Err(AppError::Authorization(
                "Only an admin may create admin accounts".to_string(),
            ));
        }
    }

    let id = create_user(db, username, password, role.as_str()).await?;

    Ok(Json(CreateUserResponse { success: true, id }))
}

#[get("/users/<id>")]
pub async fn api_get_user(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(get_user_profile_by_id(db, id).await?))
}

#[derive(Deserialize)]
pub struct UserUpdateRequest {
    pub username: Option<String>,
    pub role: Option<String>,
}

#[put("/users/<id>", data = "<update>")]
pub async fn api_update_user(
    id: i64,
    update: Json<UserUpdateRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    let target = get_user(db, id).await?;
    if target.username == ADMIN_USERNAME {
        return Err(AppError::Authorization(
            "The admin account cannot be modified".to_string(),
        ));
    }

    if update.username.is_none() && update.role.is_none() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }

    if let Some(username) = &update.username {
        update_username(db, id, username).await?;
    }

    if let Some(role) = &update.role {
        let role = Role::from_str(role).map_err(|e| AppError::Validation(e.to_string()))?;
        update_user_role(db, id, role.as_str()).await?;
    }

    Ok(Status::Ok)
}

#[delete("/users/<id>")]
pub async fn api_delete_user(id: i64, db: &State<Pool<Sqlite>>) -> Result<Status, AppError> {
    let target = get_user(db, id).await?;
    if target.username == ADMIN_USERNAME {
        return Err(AppError::Authorization(
            "The admin account cannot be deleted".to_string(),
        ));
    }

    delete_user(db, id).await?;
    Ok(Status::Ok)
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub new_password: Option<String>,
}

#[put("/users/<id>/password", data = "<request>")]
pub async fn api_reset_password(
    id: i64,
    request: Json<PasswordResetRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    let new_password = required(&request.new_password, "new_password")?;

    let target = get_user(db, id).await?;
    if target.username == ADMIN_USERNAME {
        return Err(AppError::Authorization(
            "The admin password cannot be reset here".to_string(),
        ));
    }

    CredentialRules {
        username: &target.username,
        password: new_password,
    }
    .check()?;

    update_user_password(db, id, new_password).await?;
    Ok(Status::Ok)
}

#[get("/profile?<username>")]
pub async fn api_get_profile(
    username: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserProfile>, AppError> {
    let username = username
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Query parameter 'username' is required".to_string()))?;

    Ok(Json(get_user_profile(db, username).await?))
}

#[derive(FromForm)]
pub struct ProfileUpdateForm<'r> {
    pub username: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birthdate: Option<String>,
    pub gender: Option<String>,
    pub profile_picture: Option<TempFile<'r>>,
}

#[put("/profile", data = "<form>")]
pub async fn api_update_profile(
    mut form: Form<ProfileUpdateForm<'_>>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Status, AppError> {
    let fields = ProfileFields {
        firstname: form.firstname.as_deref(),
        lastname: form.lastname.as_deref(),
        email: form.email.as_deref(),
        phone: form.phone.as_deref(),
        address: form.address.as_deref(),
        birthdate: form.birthdate.as_deref(),
        gender: form.gender.as_deref(),
    };
    let username = form.username.clone();
    update_user_profile(db, &username, &fields).await?;

    if let Some(file) = form.profile_picture.as_mut() {
        let stored = store_upload(file, &config.uploads_dir).await?;
        update_profile_picture(db, &username, &stored).await?;
    }

    Ok(Status::Ok)
}

#[derive(Deserialize)]
pub struct AccountUpdateRequest {
    pub current_username: Option<String>,
    pub current_password: Option<String>,
    pub new_username: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct AccountUpdateResponse {
    pub success: bool,
    pub username: String,
}

/// Username and/or password change, gated on the current password.
#[put("/account", data = "<request>")]
pub async fn api_update_account(
    request: Json<AccountUpdateRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AccountUpdateResponse>, AppError> {
    let current_username = required(&request.current_username, "current_username")?;
    let current_password = required(&request.current_password, "current_password")?;

    let user = authenticate_user(db, current_username, current_password)
        .await?
        .ok_or_else(|| AppError::Authentication("Current password is incorrect".to_string()))?;

    // The rename goes first: its uniqueness check can fail with a conflict,
    // and a rejected request must leave the current password intact.
    let mut effective_username = user.username.clone();
    if let Some(new_username) = request.new_username.as_deref().filter(|s| !s.is_empty()) {
        if new_username != user.username {
            update_username(db, user.id, new_username).await?;
            effective_username = new_username.to_string();
        }
    }

    if let Some(new_password) = request.new_password.as_deref().filter(|s| !s.is_empty()) {
        update_user_password(db, user.id, new_password).await?;
    }

    Ok(Json(AccountUpdateResponse {
        success: true,
        username: effective_username,
    }))
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    field
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation(format!("Field '{}' is required", name)))
}
