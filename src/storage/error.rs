//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// I/O error (file access, etc.)
    IoError(std::io::Error),

    /// A record cannot be represented in the line format
    InvalidRecord(String),

    /// Query parameters were rejected
    InvalidFilter(String),

    /// Background task running the operation failed
    BackendError(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
            StorageError::InvalidRecord(msg) => write!(f, "invalid record: {}", msg),
            StorageError::InvalidFilter(msg) => write!(f, "invalid filter: {}", msg),
            StorageError::BackendError(msg) => write!(f, "storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::BackendError(err.to_string())
    }
}
