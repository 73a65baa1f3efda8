//! CLI error types.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The database file does not exist.
    ///
    /// This typically means `init-db` has not been run yet.
    #[error("database not found at {path}. Run 'warden init-db' first")]
    DatabaseNotFound { path: PathBuf },

    /// The mutation file could not be parsed.
    #[error("invalid mutation file {path}: {reason}")]
    MutationFile { path: PathBuf, reason: String },

    /// A `--table` filter named a table the policy does not declare.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An error occurred in the policy layer.
    #[error(transparent)]
    Policy(#[from] policy::Error),

    /// Output could not be encoded.
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
