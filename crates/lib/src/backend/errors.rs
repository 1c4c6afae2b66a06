//! Storage error types for the ranklist backends.
//!
//! This module defines structured error types for position store operations,
//! giving callers a stable way to tell missing rows from driver failures.

use thiserror::Error;

use crate::item::ItemId;

/// Errors that can occur during position store operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Field additions/changes require a major version bump
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// No row exists for the id.
    #[error("Row not found: {id}")]
    RowNotFound {
        /// The id of the row that was not found
        id: ItemId,
    },

    /// A row with the id already exists.
    #[error("Row already exists: {id}")]
    DuplicateRow {
        /// The id of the existing row
        id: ItemId,
    },

    /// The store cannot evaluate a raw scope predicate.
    #[error("Unsupported scope predicate for this store: {predicate}")]
    UnsupportedPredicate {
        /// The predicate that was rejected
        predicate: String,
    },

    /// The table definition is unusable.
    #[error("Invalid table definition: {reason}")]
    InvalidTable {
        /// Why the table definition was rejected
        reason: String,
    },

    /// An attribute value does not match its column type.
    #[error("Type mismatch on column '{column}': expected {expected}, found {actual}")]
    TypeMismatch {
        /// The column being written
        column: String,
        /// The declared column type
        expected: &'static str,
        /// The type of the offered value
        actual: &'static str,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// SQL driver error.
    #[error("SQL error: {reason}")]
    SqlxError {
        /// Context and driver message
        reason: String,
        /// The underlying sqlx error, if any
        #[cfg(any(feature = "sqlite", feature = "postgres"))]
        #[source]
        source: Option<sqlx::Error>,
    },
}

impl BackendError {
    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::RowNotFound { .. })
    }

    /// Check if this error is caused by the caller's configuration or input.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            BackendError::DuplicateRow { .. }
                | BackendError::UnsupportedPredicate { .. }
                | BackendError::InvalidTable { .. }
                | BackendError::TypeMismatch { .. }
        )
    }

    /// Check if this error is related to I/O operations.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            BackendError::FileIo { .. }
                | BackendError::SerializationFailed { .. }
                | BackendError::DeserializationFailed { .. }
                | BackendError::SqlxError { .. }
        )
    }

    /// Get the row id if this error is about a specific row.
    pub fn row_id(&self) -> Option<&ItemId> {
        match self {
            BackendError::RowNotFound { id } | BackendError::DuplicateRow { id } => Some(id),
            _ => None,
        }
    }
}

// Conversion from BackendError to the main Error type
impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
