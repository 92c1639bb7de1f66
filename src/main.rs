#[macro_use]
extern crate rocket;

mod api;
mod config;
mod database;
mod db;
mod env;
mod error;
mod models;
mod pdms;
mod search;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::auth::api_login;
use api::health;
use api::install::{api_install_check, api_install_run, api_install_test_db};
use api::pdms::{api_create_client, api_get_clients, api_sync_clients};
use api::users::{
    api_create_user, api_delete_user, api_get_profile, api_get_user, api_get_users,
    api_reset_password, api_update_account, api_update_profile, api_update_user,
};
use api::wiki::{
    api_create_category, api_create_process, api_delete_category, api_delete_process,
    api_get_categories, api_get_process, api_get_process_history, api_search, api_update_process,
};
use config::AppConfig;
use database::installer::provision_schema;
use env::load_environment;
use rocket::fs::FileServer;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use telemetry::{RequestTelemetryFairing, init_tracing};
use tracing::info;

#[launch]
async fn rocket() -> _ {
    init_tracing();

    if let Err(e) = load_environment() {
        error!("Failed to load environment files: {}", e);
    }

    let config = AppConfig::from_env();
    config.ensure_directories();

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("Invalid DATABASE_URL")
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .expect("Failed to connect to SQLite database");

    if config.is_installed() {
        match provision_schema(&pool).await {
            Ok(()) => info!("Schema is up to date"),
            Err(e) => panic!("Schema provisioning failed: {}", e),
        }
    } else {
        info!("No install lock found, waiting for the install wizard");
    }

    init_rocket(pool, config).await
}

pub async fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting technician wiki");

    let uploads_dir = config.uploads_dir.clone();

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/api",
            routes![
                health,
                api_login,
                api_get_users,
                api_create_user,
                api_get_user,
                api_update_user,
                api_delete_user,
                api_reset_password,
                api_get_profile,
                api_update_profile,
                api_update_account,
                api_get_categories,
                api_create_category,
                api_delete_category,
                api_create_process,
                api_get_process,
                api_update_process,
                api_delete_process,
                api_get_process_history,
                api_search,
                api_get_clients,
                api_create_client,
                api_sync_clients,
                api_install_check,
                api_install_test_db,
                api_install_run,
            ],
        )
        .mount("/uploads", FileServer::from(uploads_dir))
        .attach(RequestTelemetryFairing)
}
