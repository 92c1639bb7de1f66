use std::path::{Path, PathBuf};

use tracing::warn;

/// Runtime settings, all sourced from the environment with the defaults the
/// original deployment used.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub pdms_root: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/technician_wiki.db".to_string()),
            data_dir: env_path("DATA_DIR", "data"),
            uploads_dir: env_path("UPLOADS_DIR", "uploads"),
            pdms_root: env_path("PDMS_ROOT", "./MOCK_PDMS"),
        }
    }

    /// Marker written at the end of a successful install run; its presence
    /// gates reinstallation.
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join("installed.lock")
    }

    /// Credentials file the installer writes for operators.
    pub fn credentials_file(&self) -> PathBuf {
        self.data_dir.join("install.env")
    }

    pub fn is_installed(&self) -> bool {
        self.lock_file().exists()
    }

    pub fn ensure_directories(&self) {
        for dir in [&self.data_dir, &self.uploads_dir, &self.pdms_root] {
            ensure_dir(dir);
        }
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn ensure_dir(path: &Path) {
    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(path) {
            warn!(path = %path.display(), error = %e, "Could not create directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_when_nothing_is_set() {
        unsafe {
            std::env::remove_var("DATABASE_URL");
            std::env::remove_var("DATA_DIR");
            std::env::remove_var("UPLOADS_DIR");
            std::env::remove_var("PDMS_ROOT");
        }

        let config = AppConfig::from_env();
        assert_eq!(config.database_url, "sqlite://data/technician_wiki.db");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(config.pdms_root, PathBuf::from("./MOCK_PDMS"));
        assert_eq!(config.lock_file(), PathBuf::from("data/installed.lock"));
    }

    #[test]
    #[serial]
    fn environment_overrides_win() {
        unsafe {
            std::env::set_var("DATABASE_URL", "sqlite:///srv/wiki.db");
            std::env::set_var("DATA_DIR", "/srv/data");
            std::env::set_var("PDMS_ROOT", "/mnt/pdms");
        }

        let config = AppConfig::from_env();
        assert_eq!(config.database_url, "sqlite:///srv/wiki.db");
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.pdms_root, PathBuf::from("/mnt/pdms"));
        assert_eq!(config.lock_file(), PathBuf::from("/srv/data/installed.lock"));

        unsafe {
            std::env::remove_var("DATABASE_URL");
            std::env::remove_var("DATA_DIR");
            std::env::remove_var("PDMS_ROOT");
        }
    }
}
