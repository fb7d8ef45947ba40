//! Error types for fleet operations

use std::fmt;

use crate::storage::StorageError;

/// Result type alias for fleet operations
pub type FleetResult<T> = Result<T, FleetError>;

/// Errors surfaced to callers of the fleet coordinator
///
/// "No eligible collector alive" is deliberately absent: that outcome is
/// represented as an unassigned generator, not as an error.
#[derive(Debug)]
pub enum FleetError {
    /// The request is rejected before anything is applied
    Validation(String),

    /// A referenced collector or generator does not exist
    NotFound(String),

    /// The collector was soft-deleted and cannot register again
    Deleted(String),

    /// The fleet store failed while persisting a record
    Storage(StorageError),
}

impl FleetError {
    pub fn collector_not_found(name: &str) -> Self {
        FleetError::NotFound(format!("collector '{name}' not found"))
    }

    pub fn collector_deleted(name: &str) -> Self {
        FleetError::Deleted(format!("collector '{name}' was deleted"))
    }

    pub fn generator_not_found(name: &str) -> Self {
        FleetError::NotFound(format!("generator '{name}' not found"))
    }
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetError::Validation(msg) => write!(f, "validation failed: {}", msg),
            FleetError::NotFound(msg) => write!(f, "{}", msg),
            FleetError::Deleted(msg) => write!(f, "{}", msg),
            FleetError::Storage(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for FleetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FleetError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for FleetError {
    fn from(err: StorageError) -> Self {
        FleetError::Storage(err)
    }
}
