//! Error types for scope resolution.
//!
//! Every variant is a caller configuration error: it is raised before anything is
//! written and retrying the same operation fails the same way.

use thiserror::Error;

/// Errors that can occur while resolving a list scope.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// No scope is configured for the list.
    #[error("A list scope cannot be null")]
    NullScope,

    /// The scope is a foreign-key reference but the key has no value.
    #[error("The list scope is a foreign key on '{column}', but the key is null")]
    NullForeignKey {
        /// The foreign-key column
        column: String,
    },

    /// The scope value is not a recognised scope kind or is malformed.
    #[error("Invalid list scope: {reason}")]
    InvalidScope {
        /// Why the scope was rejected
        reason: String,
    },

    /// A derived filter carries no filtering clause.
    #[error("Invalid scope query: {reason}")]
    InvalidQuery {
        /// Why the filter was rejected
        reason: String,
    },
}

impl ScopeError {
    /// Check if this error is caused by a missing value (scope or foreign key).
    pub fn is_null_error(&self) -> bool {
        matches!(
            self,
            ScopeError::NullScope | ScopeError::NullForeignKey { .. }
        )
    }

    /// Check if this error is caused by a malformed scope definition.
    pub fn is_invalid_error(&self) -> bool {
        matches!(
            self,
            ScopeError::InvalidScope { .. } | ScopeError::InvalidQuery { .. }
        )
    }

    /// Get the foreign-key column if this error is about one.
    pub fn column(&self) -> Option<&str> {
        match self {
            ScopeError::NullForeignKey { column } => Some(column),
            _ => None,
        }
    }

    pub(crate) fn invalid_scope(reason: impl Into<String>) -> Self {
        ScopeError::InvalidScope {
            reason: reason.into(),
        }
    }
}

// Conversion from ScopeError to the main Error type
impl From<ScopeError> for crate::Error {
    fn from(err: ScopeError) -> Self {
        crate::Error::Scope(err)
    }
}
