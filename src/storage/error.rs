//! Error types for the fleet store

use std::fmt;

/// Result type alias for store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while persisting fleet state
#[derive(Debug)]
pub enum StorageError {
    /// Could not open or connect to the database
    ConnectionFailed(String),

    /// A statement failed to execute
    QueryFailed(String),

    /// Schema migration failed
    MigrationFailed(String),

    /// A stored value could not be (de)serialised
    SerializationError(String),

    /// A stored row violates the fleet model (e.g. unknown status)
    CorruptRecord(String),

    /// I/O error (file access, etc.)
    IoError(std::io::Error),

    /// The backend has been closed or is otherwise unavailable
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to fleet store: {msg}")
            }
            StorageError::QueryFailed(msg) => write!(f, "fleet store query failed: {msg}"),
            StorageError::MigrationFailed(msg) => write!(f, "database migration failed: {msg}"),
            StorageError::SerializationError(msg) => write!(f, "serialization error: {msg}"),
            StorageError::CorruptRecord(msg) => write!(f, "corrupt fleet record: {msg}"),
            StorageError::IoError(err) => write!(f, "I/O error: {err}"),
            StorageError::Unavailable(msg) => write!(f, "fleet store unavailable: {msg}"),
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

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::IoError(io_err),
            sqlx::Error::PoolClosed => StorageError::Unavailable("connection pool closed".to_string()),
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::MigrationFailed(err.to_string())
    }
}
