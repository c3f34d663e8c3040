//! Object Store Errors
//!
//! Absence is never an error for the plain read operations; `NotFound` is
//! only produced by the `*_or_fail` variants and by a copy whose source is
//! missing.

use thiserror::Error;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider error: {0}")]
    Provider(String),

    /// One or more sub-operations of a bulk call failed. Every sub-operation
    /// was still attempted; `first` is the earliest failure observed.
    #[error("{operation}: {failed} of {total} objects failed, first error: {first}")]
    Batch {
        operation: &'static str,
        failed: usize,
        total: usize,
        first: Box<ObjectStoreError>,
    },
}

impl ObjectStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ObjectStoreError::NotFound(_))
    }
}

pub type Result<T, E = ObjectStoreError> = std::result::Result<T, E>;
