use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid PDF source: {0}")]
    InvalidSource(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Operation failed: {0}")]
    OperationError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for CodecError {
    fn from(err: lopdf::Error) -> Self {
        CodecError::OperationError(err.to_string())
    }
}
