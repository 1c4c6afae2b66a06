//! Position stores for ranklist
//!
//! This module provides the `PositionStore` trait and its implementations
//! (see [`database`]).
//!
//! A store executes the handful of directives the position manager needs: scoped counts,
//! ordered selects, bulk shifts over a position range and single-row position writes.
//! Every directive runs inside a [`PositionTransaction`], so a multi-row adjustment either
//! applies completely or not at all. The manager never sees SQL; it describes *which rows*
//! with a [`ResolvedScope`] plus a [`PositionRange`].

use std::any::Any;
use std::fmt;
use std::ops::Bound;

use async_trait::async_trait;

use crate::Result;
use crate::item::{ItemId, ItemRow};
use crate::scope::ResolvedScope;

pub mod database;
mod errors;

pub use errors::BackendError;

/// Sort order for [`PositionTransaction::select_ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Top of the list first
    Asc,
    /// Bottom of the list first
    Desc,
}

/// A row of a list as returned by ordered selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedItem {
    pub id: ItemId,
    pub position: i64,
}

/// The position predicate of a store directive.
///
/// Only rows whose position is not null ever match a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRange {
    pub lower: Bound<i64>,
    pub upper: Bound<i64>,
    pub exclude: Option<ItemId>,
}

impl PositionRange {
    /// Every row that is in the list.
    pub fn all() -> Self {
        Self::between(Bound::Unbounded, Bound::Unbounded)
    }

    pub fn between(lower: Bound<i64>, upper: Bound<i64>) -> Self {
        Self {
            lower,
            upper,
            exclude: None,
        }
    }

    /// Rows closer to the top than `position`.
    pub fn higher_than(position: i64) -> Self {
        Self::between(Bound::Unbounded, Bound::Excluded(position))
    }

    /// Rows closer to the bottom than `position`.
    pub fn lower_than(position: i64) -> Self {
        Self::between(Bound::Excluded(position), Bound::Unbounded)
    }

    /// Rows at `position` or below it.
    pub fn at_least(position: i64) -> Self {
        Self::between(Bound::Included(position), Bound::Unbounded)
    }

    /// Rows at exactly `position`.
    pub fn at(position: i64) -> Self {
        Self::between(Bound::Included(position), Bound::Included(position))
    }

    /// Leaves one row out of the range.
    pub fn excluding(mut self, id: &ItemId) -> Self {
        self.exclude = Some(id.clone());
        self
    }

    /// Returns true when a row with this id and position falls in the range.
    pub fn contains(&self, id: &ItemId, position: Option<i64>) -> bool {
        let Some(position) = position else {
            return false;
        };
        if self.exclude.as_ref() == Some(id) {
            return false;
        }
        let above_lower = match self.lower {
            Bound::Included(lower) => position >= lower,
            Bound::Excluded(lower) => position > lower,
            Bound::Unbounded => true,
        };
        let below_upper = match self.upper {
            Bound::Included(upper) => position <= upper,
            Bound::Excluded(upper) => position < upper,
            Bound::Unbounded => true,
        };
        above_lower && below_upper
    }
}

impl fmt::Display for PositionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lower {
            Bound::Included(lower) => write!(f, "[{lower}")?,
            Bound::Excluded(lower) => write!(f, "({lower}")?,
            Bound::Unbounded => write!(f, "(..")?,
        }
        f.write_str(", ")?;
        match self.upper {
            Bound::Included(upper) => write!(f, "{upper}]")?,
            Bound::Excluded(upper) => write!(f, "{upper})")?,
            Bound::Unbounded => write!(f, "..)")?,
        }
        if let Some(id) = &self.exclude {
            write!(f, " except {id}")?;
        }
        Ok(())
    }
}

/// A source of transactions over one table of orderable rows.
///
/// Stores must be `Send` and `Sync` so one store can back several managers, and implement
/// `Any` to allow downcasting to the concrete store.
#[async_trait]
pub trait PositionStore: Send + Sync + Any {
    /// Opens a transaction. Dropping it without calling `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn PositionTransaction>>;

    /// The column this store writes positions to.
    ///
    /// `None` for stores that keep positions outside any named column; those serve any
    /// configured column.
    fn position_column(&self) -> Option<&str> {
        None
    }

    /// Returns a reference to the store as a `dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// An open store transaction.
///
/// Shift directives return the number of rows they touched.
#[async_trait]
pub trait PositionTransaction: Send {
    /// Counts the in-list rows of `scope` within `range`.
    async fn count(&mut self, scope: &ResolvedScope, range: &PositionRange) -> Result<i64>;

    /// Selects in-list rows of `scope` within `range`, ordered by position then id.
    async fn select_ordered(
        &mut self,
        scope: &ResolvedScope,
        range: &PositionRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> Result<Vec<ListedItem>>;

    /// Adds one to the position of every matching row.
    async fn increment_where(&mut self, scope: &ResolvedScope, range: &PositionRange)
    -> Result<u64>;

    /// Subtracts one from the position of every matching row.
    async fn decrement_where(&mut self, scope: &ResolvedScope, range: &PositionRange)
    -> Result<u64>;

    /// Reads the stored position of a row.
    ///
    /// # Errors
    /// `BackendError::RowNotFound` if no row has this id.
    async fn get_position(&mut self, id: &ItemId) -> Result<Option<i64>>;

    /// Writes the position of a single row.
    ///
    /// # Errors
    /// `BackendError::RowNotFound` if no row has this id.
    async fn set_position(&mut self, id: &ItemId, position: Option<i64>) -> Result<()>;

    /// Loads a full row.
    async fn fetch(&mut self, id: &ItemId) -> Result<ItemRow>;

    /// Inserts a new row; `BackendError::DuplicateRow` if the id is taken.
    async fn insert(&mut self, row: &ItemRow) -> Result<()>;

    /// Overwrites an existing row.
    async fn update(&mut self, row: &ItemRow) -> Result<()>;

    /// Deletes a row.
    async fn delete(&mut self, id: &ItemId) -> Result<()>;

    /// Makes every write of this transaction visible.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
