use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Invalid page permutation: {0}")]
    InvalidPermutation(String),

    #[error("Document invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for EditorError {
    fn from(err: serde_json::Error) -> Self {
        EditorError::SerializationError(err.to_string())
    }
}
