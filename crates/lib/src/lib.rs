//!
//! ranklist: gapless, scope-aware positions for reorderable lists.
//! This library keeps an integer `position` column dense and unique within each list
//! ("scope") of a table while items are inserted, moved and removed.
//!
//! ## Core Concepts
//!
//! * **Items (`item::ListItem`)**: A row identity plus a tracked position and tracked
//!   scope attributes. "Tracked" values keep the persisted snapshot next to pending changes.
//! * **Scopes (`scope::Scope`)**: The predicate that delimits one list inside a shared table:
//!   a raw SQL predicate, a foreign-key equality, or a derived filter.
//! * **Backends (`backend::PositionStore`)**: A pluggable storage layer executing scoped counts,
//!   ordered selects and bulk shifts inside atomic transactions.
//! * **PositionManager (`manager::PositionManager`)**: The engine issuing shift directives
//!   so that positions stay in `[top, top + count - 1]` at rest.
//! * **Lifecycle (`lifecycle::Lifecycle`)**: A thin host adapter that persists rows and runs
//!   the manager's hooks at create/update/delete boundaries.

pub mod backend;
pub mod config;
pub mod constants;
pub mod item;
pub mod lifecycle;
pub mod manager;
pub mod scope;

pub use config::{ListConfig, Placement};
pub use item::{Attributes, ItemId, ListItem, Value, ValueKind};
pub use lifecycle::Lifecycle;
pub use manager::{ListHooks, PositionManager};
pub use scope::{Filter, ResolvedScope, Scope};

/// Result type used throughout the ranklist library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the ranklist library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed JSON configuration
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Structured scope errors from the scope module
    #[error(transparent)]
    Scope(scope::ScopeError),

    /// Structured storage errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Scope(_) => "scope",
            Error::Backend(_) => "backend",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is a caller configuration error.
    ///
    /// These are never transient; retrying the operation fails the same way.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Scope(_))
    }

    /// Check if this error is scope-related.
    pub fn is_scope_error(&self) -> bool {
        matches!(self, Error::Scope(_))
    }

    /// Check if this error is storage-related.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Returns the scope error, if this is one.
    pub fn as_scope_error(&self) -> Option<&scope::ScopeError> {
        match self {
            Error::Scope(err) => Some(err),
            _ => None,
        }
    }
}
