use thiserror::Error;

/// Errors raised while building or decoding wire types
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Feature vector has the wrong number of values
    #[error("Feature arity mismatch: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize },

    /// A feature value is NaN or infinite
    #[error("Non-finite value for feature '{feature}'")]
    NonFinite { feature: &'static str },

    /// Class index outside {0, 1}
    #[error("Unknown class index: {0}")]
    UnknownClass(usize),

    /// Message was produced by an incompatible schema version
    #[error("Unsupported schema version: {0}")]
    UnsupportedVersion(u64),

    /// Payload is not a valid stream message
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame bytes are not valid UTF-8
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    /// Underlying I/O failure while reading frames
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using SchemaError
pub type Result<T> = std::result::Result<T, SchemaError>;
