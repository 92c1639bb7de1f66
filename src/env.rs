use std::path::Path;

use tracing::info;

/// Shared settings checked into the deployment.
const BASE_ENV_FILE: &str = "config/wiki.env";
/// Operator-local secrets, never committed.
const SECRETS_ENV_FILE: &str = "config/.secrets.env";
/// Written by the install wizard; carries the DATABASE_URL it provisioned so
/// an installed instance keeps its database across restarts.
const INSTALL_ENV_FILE: &str = "data/install.env";

/// Layers env files in increasing precedence: base, then the
/// `config/<profile>.env` matching ROCKET_PROFILE, then secrets, then the
/// installer's output. Missing files are skipped.
pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let profile = dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());
    let profile_file = format!("config/{}.env", profile);

    for env_file in [
        BASE_ENV_FILE,
        profile_file.as_str(),
        SECRETS_ENV_FILE,
        INSTALL_ENV_FILE,
    ] {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}
