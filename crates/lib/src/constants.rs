//! Constants used throughout the ranklist library.
//!
//! This module provides central definitions for configuration defaults
//! and the reserved predicate used when no scope is configured.

/// Default name of the column holding the position integer.
pub const DEFAULT_POSITION_COLUMN: &str = "position";

/// Default position of the first item in a list.
pub const DEFAULT_TOP_OF_LIST: i64 = 1;

/// Predicate matching every row of the table; the scope used when none is configured.
pub const DEFAULT_SCOPE: &str = "1 = 1";

/// Default name of the primary key column for SQL tables.
pub const DEFAULT_ID_COLUMN: &str = "id";
