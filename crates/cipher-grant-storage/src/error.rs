use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt journal entry at line {line}: {reason}")]
    CorruptEntry { line: usize, reason: String },

    #[error("Journal sequence gap at line {line}: expected {expected}, got {actual}")]
    SequenceGap { line: usize, expected: u64, actual: u64 },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Journal {0} is locked by another process")]
    Locked(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
