use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum KilnError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Generic Error: {0}")]
    Generic(String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Checksum Error: {0}")]
    ChecksumError(String),

    #[error("Invalid recipe '{0}': {1}")]
    InvalidRecipe(String, String),

    #[error("Template Error: {0}")]
    Template(String),

    /// A fatal requirement was not met. Carries the requirement's message verbatim.
    #[error("{message}")]
    UnsatisfiedRequirement { name: String, message: String },

    #[error("Conflicting build options: {0}")]
    ConflictingOptions(String),

    /// An expected literal was missing from an upstream file.
    #[error("Configuration drift in {file}: expected text not found: {pattern:?}")]
    ConfigurationDrift { file: String, pattern: String },

    #[error("Build failed: {command} exited with {status}")]
    BuildFailure {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("Test failed: {command} exited with {status}")]
    TestFailure {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Build environment setup failed: {0}")]
    BuildEnvError(String),

    #[error("IoError: {0}")]
    IoError(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Probe Error: {0}")]
    ProbeError(String),
}

impl From<std::io::Error> for KilnError {
    fn from(err: std::io::Error) -> Self {
        KilnError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for KilnError {
    fn from(err: reqwest::Error) -> Self {
        KilnError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        KilnError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, KilnError>;
