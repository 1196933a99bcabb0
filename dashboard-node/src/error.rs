use thiserror::Error;

use flowguard_common::SchemaError;

/// Dashboard error types
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stream endpoint returned {0}")]
    Status(reqwest::StatusCode),

    #[error("Frame error: {0}")]
    Frame(#[from] SchemaError),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
