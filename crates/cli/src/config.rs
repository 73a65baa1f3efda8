//! Configuration loading from warden.toml.

use policy::{Policy, PolicyFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Row store configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Tables, named predicates and rules.
    #[serde(flatten)]
    pub policy: PolicyFile,
}

/// Row store configuration.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file. Relative paths are resolved against the config file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("warden.db")
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content)?;

        if config.database.path.is_relative()
            && let Some(dir) = path.parent()
        {
            config.database.path = dir.join(&config.database.path);
        }
        Ok(config)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build and validate the policy declared by this configuration.
    pub fn policy(&self) -> Result<Policy, ConfigError> {
        Ok(Policy::from_file(self.policy.clone())?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid policy: {0}")]
    Policy(#[from] policy::Error),
}
