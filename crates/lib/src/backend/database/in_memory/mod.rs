//! In-memory position store implementation
//!
//! This module provides an in-memory implementation of the `PositionStore` trait,
//! suitable for testing, development, or hosts that keep their rows in memory.

mod persistence;

use std::any::Any;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{Direction, ListedItem, PositionRange, PositionStore, PositionTransaction};
use crate::item::{ItemId, ItemRow};
use crate::scope::ResolvedScope;

type Rows = BTreeMap<ItemId, ItemRow>;

/// A position store keeping its rows in a `BTreeMap`.
///
/// Scopes are evaluated in memory: filter and foreign-key scopes are matched against each
/// row's attributes. Raw SQL predicates cannot be evaluated here; the only raw predicate
/// accepted is the match-all default `1 = 1`, anything else fails with
/// `BackendError::UnsupportedPredicate`.
///
/// Transactions hold the store lock from `begin` until they are committed or dropped,
/// and write to a staged copy of the rows that replaces the live rows on commit.
#[derive(Debug, Default)]
pub struct InMemory {
    rows: Arc<Mutex<Rows>>,
}

impl InMemory {
    /// Creates a new, empty `InMemory` store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given rows.
    pub fn with_rows(rows: impl IntoIterator<Item = ItemRow>) -> Self {
        let rows = rows.into_iter().map(|row| (row.id.clone(), row)).collect();
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    /// Returns a snapshot of every committed row, ordered by id.
    pub async fn rows(&self) -> Vec<ItemRow> {
        self.rows.lock().await.values().cloned().collect()
    }

    /// Returns the number of committed rows.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Saves every committed row to a JSON file.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_to_file(self, path).await
    }

    /// Loads a store from a JSON file; a missing file yields an empty store.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load_from_file(path).await
    }
}

#[async_trait]
impl PositionStore for InMemory {
    async fn begin(&self) -> Result<Box<dyn PositionTransaction>> {
        let guard = Arc::clone(&self.rows).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<Rows>,
    staged: Rows,
}

fn check_scope(scope: &ResolvedScope) -> Result<()> {
    match scope {
        ResolvedScope::Raw(predicate) if !scope.is_match_all() => {
            Err(BackendError::UnsupportedPredicate {
                predicate: predicate.clone(),
            }
            .into())
        }
        _ => Ok(()),
    }
}

fn in_scope(scope: &ResolvedScope, row: &ItemRow) -> bool {
    match scope {
        ResolvedScope::Filter(filter) => filter.matches(&row.attributes),
        ResolvedScope::Raw(_) => true,
    }
}

impl InMemoryTransaction {
    fn matching<'a>(
        &'a self,
        scope: &'a ResolvedScope,
        range: &'a PositionRange,
    ) -> Result<impl Iterator<Item = &'a ItemRow> + 'a> {
        check_scope(scope)?;
        Ok(self
            .staged
            .values()
            .filter(move |row| range.contains(&row.id, row.position) && in_scope(scope, row)))
    }

    fn shift(&mut self, scope: &ResolvedScope, range: &PositionRange, delta: i64) -> Result<u64> {
        check_scope(scope)?;
        let mut touched = 0;
        for row in self.staged.values_mut() {
            if !range.contains(&row.id, row.position) || !in_scope(scope, row) {
                continue;
            }
            row.position = row.position.map(|position| position + delta);
            touched += 1;
        }
        Ok(touched)
    }

    fn row_mut(&mut self, id: &ItemId) -> Result<&mut ItemRow> {
        self.staged
            .get_mut(id)
            .ok_or_else(|| BackendError::RowNotFound { id: id.clone() }.into())
    }
}

#[async_trait]
impl PositionTransaction for InMemoryTransaction {
    async fn count(&mut self, scope: &ResolvedScope, range: &PositionRange) -> Result<i64> {
        Ok(self.matching(scope, range)?.count() as i64)
    }

    async fn select_ordered(
        &mut self,
        scope: &ResolvedScope,
        range: &PositionRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> Result<Vec<ListedItem>> {
        let mut items: Vec<ListedItem> = self
            .matching(scope, range)?
            .filter_map(|row| {
                row.position.map(|position| ListedItem {
                    id: row.id.clone(),
                    position,
                })
            })
            .collect();
        items.sort_by(|a, b| (a.position, &a.id).cmp(&(b.position, &b.id)));
        if direction == Direction::Desc {
            items.reverse();
        }
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn increment_where(
        &mut self,
        scope: &ResolvedScope,
        range: &PositionRange,
    ) -> Result<u64> {
        self.shift(scope, range, 1)
    }

    async fn decrement_where(
        &mut self,
        scope: &ResolvedScope,
        range: &PositionRange,
    ) -> Result<u64> {
        self.shift(scope, range, -1)
    }

    async fn get_position(&mut self, id: &ItemId) -> Result<Option<i64>> {
        Ok(self.row_mut(id)?.position)
    }

    async fn set_position(&mut self, id: &ItemId, position: Option<i64>) -> Result<()> {
        self.row_mut(id)?.position = position;
        Ok(())
    }

    async fn fetch(&mut self, id: &ItemId) -> Result<ItemRow> {
        Ok(self.row_mut(id)?.clone())
    }

    async fn insert(&mut self, row: &ItemRow) -> Result<()> {
        if self.staged.contains_key(&row.id) {
            return Err(BackendError::DuplicateRow { id: row.id.clone() }.into());
        }
        self.staged.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update(&mut self, row: &ItemRow) -> Result<()> {
        *self.row_mut(&row.id)? = row.clone();
        Ok(())
    }

    async fn delete(&mut self, id: &ItemId) -> Result<()> {
        self.staged
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::RowNotFound { id: id.clone() }.into())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
