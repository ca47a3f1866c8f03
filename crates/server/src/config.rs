//! Server configuration
//!
//! Loaded from `dorma.toml`: an explicit `--config` path, otherwise the
//! platform config directory, otherwise built-in defaults. Every field is
//! optional in the file.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TCP port to listen on
    pub port: u16,
    /// SQLite database file; defaults to the platform data dir
    pub database_path: Option<PathBuf>,
    /// Session lifetime in hours
    pub session_hours: i64,
    /// Credentials for the first Admin, seeded when the users table is empty
    pub seed_admin_email: String,
    pub seed_admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: dorma_net::DEFAULT_PORT,
            database_path: None,
            session_hours: 24,
            seed_admin_email: "admin@dorma.local".to_string(),
            seed_admin_password: "change-me".to_string(),
        }
    }
}

impl Config {
    /// Load config from an explicit path or the platform config dir.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => project_dirs().map(|d| d.config_dir().join("dorma.toml")),
        };

        match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                let config: Config = toml::from_str(&content)?;
                info!(path = %path.display(), "Loaded config");
                Ok(config)
            }
            Some(path) => {
                if explicit.is_some() {
                    return Err(ConfigError::Missing(path));
                }
                warn!(path = %path.display(), "No config file, using defaults");
                Ok(Config::default())
            }
            None => Ok(Config::default()),
        }
    }

    /// Resolve the database path, creating parent directories as needed
    pub fn resolve_database_path(&self) -> Result<PathBuf, ConfigError> {
        let path = match &self.database_path {
            Some(p) => p.clone(),
            None => {
                let dirs = project_dirs().ok_or(ConfigError::NoHome)?;
                dirs.data_dir().join("dorma.db")
            }
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "dorma", "dorma")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    Missing(PathBuf),

    #[error("Cannot determine a home directory")]
    NoHome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, dorma_net::DEFAULT_PORT);
        assert_eq!(config.session_hours, 24);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dorma.toml");
        std::fs::write(&path, "port = 9000\nseed_admin_email = \"boss@dorm.test\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.seed_admin_email, "boss@dorm.test");
        assert_eq!(config.session_hours, 24);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/dorma.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }
}
