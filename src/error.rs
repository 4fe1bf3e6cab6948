//! Error types for daftar

use thiserror::Error;

/// Result type alias for daftar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for daftar
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {name} is {size} bytes (limit {limit})")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// Convert walker errors to our Error type
impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}
