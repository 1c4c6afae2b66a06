//! Database-style store implementations
//!
//! These stores keep rows in a queryable table, in memory or in a SQL database.

mod in_memory;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

pub use in_memory::InMemory;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub use sql::{DbKind, SqlxStore, TableSpec};
