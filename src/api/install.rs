use rocket::State;
use rocket::serde::{Deserialize, Serialize, json::Json};

use crate::config::AppConfig;
use crate::database::installer::{InstallStatus, check_prerequisites, run_install, test_connection};
use crate::error::AppError;

#[get("/install/check")]
pub async fn api_install_check(config: &State<AppConfig>) -> Json<InstallStatus> {
    Json(check_prerequisites(config))
}

#[derive(Deserialize)]
pub struct InstallRequest {
    pub database_url: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct InstallResponse {
    pub success: bool,
}

#[post("/install/test-db", data = "<request>")]
pub async fn api_install_test_db(
    request: Json<InstallRequest>,
    config: &State<AppConfig>,
) -> Result<Json<InstallResponse>, AppError> {
    let url = request
        .database_url
        .as_deref()
        .unwrap_or(&config.database_url);
    test_connection(url).await?;
    Ok(Json(InstallResponse { success: true }))
}

#[post("/install/run", data = "<request>")]
pub async fn api_install_run(
    request: Json<InstallRequest>,
    config: &State<AppConfig>,
) -> Result<Json<InstallResponse>, AppError> {
    let url = request
        .database_url
        .as_deref()
        .unwrap_or(&config.database_url);
    run_install(config, url).await?;
    Ok(Json(InstallResponse { success: true }))
}
