use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{
    Category, CategoryWithProcesses, Client, DbHistoryEntry, DbProcess, DbUser, DbUserProfile,
    HistoryEntry, Process, ProcessSummary, User, UserProfile,
};

// --- Users ---

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Option<i64>,
    username: Option<String>,
    password: Option<String>,
    role: Option<String>,
    created_at: Option<chrono::NaiveDateTime>,
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, username, password, role, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let valid = bcrypt::verify(password, row.password.as_deref().unwrap_or_default())
                .unwrap_or(false);
            if valid {
                Ok(Some(User::from(DbUser {
                    id: row.id,
                    username: row.username,
                    role: row.role,
                    created_at: row.created_at,
                })))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

#[instrument(skip_all, fields(username, role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    role: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing = sqlx::query("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hashed_password)
        .bind(role)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_all_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    info!("Fetching all users");
    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, role, created_at FROM users ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, role, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

const PROFILE_COLUMNS: &str = "id, username, role, firstname, lastname, email, phone, \
     address, birthdate, gender, profile_picture";

#[instrument]
pub async fn get_user_profile(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<UserProfile, AppError> {
    info!("Fetching user profile");
    let row = sqlx::query_as::<_, DbUserProfile>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        PROFILE_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(profile) => Ok(UserProfile::from(profile)),
        _ => Err(AppError::NotFound(format!(
            "User '{}' not found in database",
            username
        ))),
    }
}

#[instrument]
pub async fn get_user_profile_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<UserProfile, AppError> {
    info!("Fetching user profile by ID");
    let row = sqlx::query_as::<_, DbUserProfile>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        PROFILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(profile) => Ok(UserProfile::from(profile)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

/// Resolves a username to an id, tolerating unknown names. Used when the
/// client supplies an author or modifier identity that may not exist.
#[instrument]
pub async fn find_user_id(pool: &Pool<Sqlite>, username: &str) -> Result<Option<i64>, AppError> {
    let row = sqlx::query_as::<_, (i64,)>("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(id,)| id))
}

#[instrument]
pub async fn update_username(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_username: &str,
) -> Result<(), AppError> {
    info!("Updating username");
    let existing = sqlx::query("SELECT id FROM users WHERE username = ? AND id != ?")
        .bind(new_username)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    sqlx::query("UPDATE users SET username = ? WHERE id = ?")
        .bind(new_username)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn update_user_role(
    pool: &Pool<Sqlite>,
    user_id: i64,
    role: &str,
) -> Result<(), AppError> {
    info!("Updating user role");
    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn delete_user(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    info!("Deleting user");
    let res = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            user_id
        )));
    }

    Ok(())
}

pub struct ProfileFields<'a> {
    pub firstname: Option<&'a str>,
    pub lastname: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
    pub birthdate: Option<&'a str>,
    pub gender: Option<&'a str>,
}

#[instrument(skip(pool, fields))]
pub async fn update_user_profile(
    pool: &Pool<Sqlite>,
    username: &str,
    fields: &ProfileFields<'_>,
) -> Result<(), AppError> {
    info!("Updating user profile");
    let res = sqlx::query(
        "UPDATE users
         SET firstname = ?, lastname = ?, email = ?, phone = ?, address = ?, birthdate = ?, gender = ?
         WHERE username = ?",
    )
    .bind(fields.firstname)
    .bind(fields.lastname)
    .bind(fields.email)
    .bind(fields.phone)
    .bind(fields.address)
    .bind(fields.birthdate)
    .bind(fields.gender)
    .bind(username)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "User '{}' not found in database",
            username
        )));
    }

    Ok(())
}

#[instrument]
pub async fn update_profile_picture(
    pool: &Pool<Sqlite>,
    username: &str,
    picture_path: &str,
) -> Result<(), AppError> {
    info!("Updating profile picture");
    sqlx::query("UPDATE users SET profile_picture = ? WHERE username = ?")
        .bind(picture_path)
        .bind(username)
        .execute(pool)
        .await?;

    Ok(())
}

// --- Categories ---

#[instrument]
pub async fn create_category(pool: &Pool<Sqlite>, name: &str) -> Result<i64, AppError> {
    info!("Creating category");
    let existing = sqlx::query("SELECT id FROM categories WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Category '{}' already exists",
            name
        )));
    }

    let res = sqlx::query("INSERT INTO categories (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn list_categories(pool: &Pool<Sqlite>) -> Result<Vec<Category>, AppError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM categories ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name)| Category { id, name })
        .collect())
}

#[derive(sqlx::FromRow)]
struct CategoryProcessRow {
    category_id: i64,
    category_name: String,
    process_id: Option<i64>,
    title: Option<String>,
    content: Option<String>,
    file_path: Option<String>,
}

/// One join, grouped by category id in memory. Categories without processes
/// still appear with an empty list.
#[instrument]
pub async fn get_categories_with_processes(
    pool: &Pool<Sqlite>,
) -> Result<Vec<CategoryWithProcesses>, AppError> {
    info!("Fetching categories with processes");
    let rows = sqlx::query_as::<_, CategoryProcessRow>(
        "SELECT c.id AS category_id, c.name AS category_name,
                p.id AS process_id, p.title, p.content, p.file_path
         FROM categories c
         LEFT JOIN processes p ON p.category_id = c.id
         ORDER BY c.name, c.id, p.title, p.id",
    )
    .fetch_all(pool)
    .await?;

    let mut categories: Vec<CategoryWithProcesses> = Vec::new();
    for row in rows {
        if categories.last().map(|c| c.id) != Some(row.category_id) {
            categories.push(CategoryWithProcesses {
                id: row.category_id,
                name: row.category_name.clone(),
                processes: Vec::new(),
            });
        }

        if let (Some(id), Some(title)) = (row.process_id, row.title) {
            // The last entry is always this row's category.
            if let Some(category) = categories.last_mut() {
                category.processes.push(ProcessSummary {
                    id,
                    title,
                    content: row.content,
                    file_path: row.file_path,
                });
            }
        }
    }

    Ok(categories)
}

/// Orphans the category's processes rather than deleting them: documents
/// survive their category.
#[instrument]
pub async fn delete_category(pool: &Pool<Sqlite>, category_id: i64) -> Result<(), AppError> {
    info!("Deleting category");
    sqlx::query("UPDATE processes SET category_id = NULL WHERE category_id = ?")
        .bind(category_id)
        .execute(pool)
        .await?;

    let res = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(category_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Category with id {} not found in database",
            category_id
        )));
    }

    Ok(())
}

// --- Processes ---

#[instrument(skip(pool, content))]
pub async fn create_process(
    pool: &Pool<Sqlite>,
    category_id: i64,
    title: &str,
    content: Option<&str>,
    file_path: Option<&str>,
    author_id: Option<i64>,
) -> Result<i64, AppError> {
    info!("Creating process");
    let res = sqlx::query(
        "INSERT INTO processes (category_id, title, content, file_path, author_id)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(category_id)
    .bind(title)
    .bind(content)
    .bind(file_path)
    .bind(author_id)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_process(pool: &Pool<Sqlite>, id: i64) -> Result<Process, AppError> {
    info!("Fetching process");
    let row = sqlx::query_as::<_, DbProcess>(
        "SELECT p.id, p.category_id, p.title, p.content, p.file_path, p.author_id,
                p.created_at, u.username AS author_name, u.profile_picture AS author_picture
         FROM processes p
         LEFT JOIN users u ON u.id = p.author_id
         WHERE p.id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(process) => Ok(Process::from(process)),
        _ => Err(AppError::NotFound(format!(
            "Process with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn update_process_title(
    pool: &Pool<Sqlite>,
    process_id: i64,
    title: &str,
) -> Result<(), AppError> {
    info!("Updating process title");
    let res = sqlx::query("UPDATE processes SET title = ? WHERE id = ?")
        .bind(title)
        .bind(process_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Process with id {} not found in database",
            process_id
        )));
    }

    Ok(())
}

#[instrument(skip(pool, content))]
pub async fn update_process_content(
    pool: &Pool<Sqlite>,
    process_id: i64,
    content: &str,
) -> Result<(), AppError> {
    info!("Updating process content");
    let res = sqlx::query("UPDATE processes SET content = ? WHERE id = ?")
        .bind(content)
        .bind(process_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Process with id {} not found in database",
            process_id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn delete_process(pool: &Pool<Sqlite>, process_id: i64) -> Result<(), AppError> {
    info!("Deleting process");
    let res = sqlx::query("DELETE FROM processes WHERE id = ?")
        .bind(process_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Process with id {} not found in database",
            process_id
        )));
    }

    Ok(())
}

// --- History ---

#[instrument]
pub async fn insert_history(
    pool: &Pool<Sqlite>,
    process_id: i64,
    user_id: i64,
) -> Result<i64, AppError> {
    info!("Appending history entry");
    let now = Utc::now().naive_utc();
    let res = sqlx::query(
        "INSERT INTO process_history (process_id, user_id, modified_at) VALUES (?, ?, ?)",
    )
    .bind(process_id)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_process_history(
    pool: &Pool<Sqlite>,
    process_id: i64,
) -> Result<Vec<HistoryEntry>, AppError> {
    info!("Fetching process history");
    let rows = sqlx::query_as::<_, DbHistoryEntry>(
        "SELECT h.id, h.process_id, h.user_id, h.modified_at,
                u.username, u.profile_picture
         FROM process_history h
         JOIN users u ON u.id = h.user_id
         WHERE h.process_id = ?
         ORDER BY h.modified_at DESC, h.id DESC",
    )
    .bind(process_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(HistoryEntry::from).collect())
}

// --- Search ---

#[derive(sqlx::FromRow, Clone)]
pub struct SearchRow {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub category_name: Option<String>,
}

#[instrument]
pub async fn search_processes(pool: &Pool<Sqlite>, query: &str) -> Result<Vec<SearchRow>, AppError> {
    info!("Searching processes");
    let pattern = format!("%{}%", query);
    let rows = sqlx::query_as::<_, SearchRow>(
        "SELECT p.id, p.title, p.content, p.file_path, c.name AS category_name
         FROM processes p
         LEFT JOIN categories c ON c.id = p.category_id
         WHERE p.title LIKE ? OR p.content LIKE ?
         LIMIT 10",
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// --- PDMS clients ---

#[instrument]
pub async fn list_clients(pool: &Pool<Sqlite>) -> Result<Vec<Client>, AppError> {
    info!("Fetching PDMS clients");
    let rows = sqlx::query_as::<_, Client>(
        "SELECT name, email, password, folder_path FROM clients ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sync upsert keyed by directory name: existing values are overwritten
/// unconditionally, the directory always wins.
#[instrument(skip_all, fields(name))]
pub async fn upsert_client(
    pool: &Pool<Sqlite>,
    name: &str,
    email: &str,
    password: &str,
    folder_path: &str,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO clients (name, email, password, folder_path)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(name) DO UPDATE SET
             email = excluded.email,
             password = excluded.password,
             folder_path = excluded.folder_path",
    )
    .bind(name)
    .bind(email)
    .bind(password)
    .bind(folder_path)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip_all, fields(name))]
pub async fn insert_client(
    pool: &Pool<Sqlite>,
    name: &str,
    email: &str,
    password: &str,
    folder_path: &str,
) -> Result<(), AppError> {
    info!("Inserting PDMS client");
    sqlx::query("INSERT INTO clients (name, email, password, folder_path) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(email)
        .bind(password)
        .bind(folder_path)
        .execute(pool)
        .await?;

    Ok(())
}

/// Best-effort history append used by the process content update: failures
/// are logged, never surfaced to the caller.
pub async fn try_insert_history(pool: &Pool<Sqlite>, process_id: i64, user_id: i64) {
    if let Err(e) = insert_history(pool, process_id, user_id).await {
        warn!(
            process_id,
            user_id,
            error = %e,
            "Failed to append history entry"
        );
    }
}
