use std::path::PathBuf;
use thiserror::Error;

use crate::db::models::RemoteStep;

#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("Options {} are mandatory", .0.join(", "))]
    MissingOptions(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow file name {name} is used by both {} and {}", .first.display(), .second.display())]
    DuplicateFile {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Unable to read workflow file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("{step} failed on {message}")]
    Remote { step: RemoteStep, message: String },

    #[error("Unsupported result code {code} from {}: {message}", .step.procedure())]
    UnsupportedResult {
        step: RemoteStep,
        code: String,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Result type for deployer operations
pub type DeployerResult<T> = Result<T, DeployerError>;

impl From<sqlx::Error> for DeployerError {
    fn from(err: sqlx::Error) -> Self {
        DeployerError::Database(err.to_string())
    }
}

impl From<config::ConfigError> for DeployerError {
    fn from(err: config::ConfigError) -> Self {
        DeployerError::Config(err.to_string())
    }
}
