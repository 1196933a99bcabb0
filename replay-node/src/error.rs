use thiserror::Error;

use flowguard_common::SchemaError;

/// Errors that can occur while preparing or serving the replay
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset could not be turned into a feature matrix
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Model artifact could not be loaded or evaluated
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Feature matrix width differs from the classifier input width
    #[error("Feature arity mismatch: classifier expects {expected} features, matrix has {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// Wire schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Invalid state error
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Dataset loading failures (all startup-fatal)
#[derive(Error, Debug)]
pub enum DatasetError {
    /// File unreadable or not valid CSV
    #[error("Failed to read dataset: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the header
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// No rows survived filtering
    #[error("No valid rows remain after filtering")]
    Empty,
}

/// Model artifact failures (all startup-fatal)
#[derive(Error, Debug)]
pub enum ModelError {
    /// Artifact file unreadable
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact is not valid JSON for the expected format
    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    /// Artifact declares a format this build cannot evaluate
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// A weight tensor has an inconsistent shape
    #[error("Invalid shape for {tensor}: expected {expected}, got {got}")]
    Shape {
        tensor: String,
        expected: String,
        got: String,
    },

    /// Classifier output does not have the expected shape
    #[error("Unexpected classifier output: {0}")]
    Output(String),
}

/// Result type alias using ReplayError
pub type Result<T> = std::result::Result<T, ReplayError>;

impl From<config::ConfigError> for ReplayError {
    fn from(err: config::ConfigError) -> Self {
        ReplayError::Config(err.to_string())
    }
}
