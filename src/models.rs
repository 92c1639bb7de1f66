use std::fmt;

use anyhow::Error;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// The sentinel account: cannot be deleted, cannot have its password reset
/// through the admin endpoint, and only an admin may create other admins.
pub const ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Admin,
    Technician,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Technician => "technician",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "admin" => Ok(Role::Admin),
            "technician" => Ok(Role::Technician),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            username: user.username.unwrap_or_default(),
            role: Role::from_str(user.role.as_deref().unwrap_or("technician"))
                .unwrap_or(Role::Technician),
            created_at: to_utc(user.created_at),
        }
    }
}

/// Profile fields as exposed by `/api/profile` and `/api/users/<id>`. The
/// password hash never leaves the database.
#[derive(Debug, Serialize, Clone)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birthdate: Option<String>,
    pub gender: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserProfile {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birthdate: Option<String>,
    pub gender: Option<String>,
    pub profile_picture: Option<String>,
}

impl From<DbUserProfile> for UserProfile {
    fn from(row: DbUserProfile) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            username: row.username.unwrap_or_default(),
            role: Role::from_str(row.role.as_deref().unwrap_or("technician"))
                .unwrap_or(Role::Technician),
            firstname: row.firstname,
            lastname: row.lastname,
            email: row.email,
            phone: row.phone,
            address: row.address,
            birthdate: row.birthdate,
            gender: row.gender,
            profile_picture: row.profile_picture,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Sidebar payload: every category with its process summaries nested.
#[derive(Debug, Serialize, Clone)]
pub struct CategoryWithProcesses {
    pub id: i64,
    pub name: String,
    pub processes: Vec<ProcessSummary>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ProcessSummary {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Process {
    pub id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProcess {
    pub id: Option<i64>,
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_picture: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbProcess> for Process {
    fn from(row: DbProcess) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            category_id: row.category_id,
            title: row.title.unwrap_or_default(),
            content: row.content,
            file_path: row.file_path,
            author_id: row.author_id,
            author_name: row.author_name,
            author_picture: row.author_picture,
            created_at: to_utc(row.created_at),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub process_id: i64,
    pub user_id: i64,
    pub username: String,
    pub profile_picture: Option<String>,
    pub modified_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbHistoryEntry {
    pub id: Option<i64>,
    pub process_id: Option<i64>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub profile_picture: Option<String>,
    pub modified_at: Option<NaiveDateTime>,
}

impl From<DbHistoryEntry> for HistoryEntry {
    fn from(row: DbHistoryEntry) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            process_id: row.process_id.unwrap_or_default(),
            user_id: row.user_id.unwrap_or_default(),
            username: row.username.unwrap_or_default(),
            profile_picture: row.profile_picture,
            modified_at: to_utc(row.modified_at),
        }
    }
}

/// A PDMS client mirrored from the filesystem tree. The directory is the
/// source of truth; these rows are a cache rebuilt by full rescan.
#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
pub struct Client {
    pub name: String,
    pub email: String,
    pub password: String,
    pub folder_path: String,
}

fn to_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}
