//! The position manager.
//!
//! [`PositionManager`] keeps the positions of every list dense: at rest the in-list items
//! of a scope hold exactly `top, top + 1, .., top + count - 1`. Each public operation runs
//! in a single store transaction and only updates the item it was given after that
//! transaction has committed, so a failed operation leaves both the store and the item
//! untouched.
//!
//! Operations address the list the item is *stored* in: its persisted scope and the
//! position read back from the store. Pending scope changes are applied by the
//! [`ListHooks`] when the item is saved.

mod hooks;

pub use hooks::ListHooks;

use std::ops::Bound;
use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::backend::{
    BackendError, Direction, ListedItem, PositionRange, PositionStore, PositionTransaction,
};
use crate::config::{ListConfig, Placement};
use crate::item::{ItemId, ListItem};
use crate::scope::{ResolvedScope, evaluator};

/// Maintains gapless positions for the lists of one table.
pub struct PositionManager {
    store: Arc<dyn PositionStore>,
    config: ListConfig,
}

impl PositionManager {
    /// Creates a manager over `store`.
    ///
    /// # Errors
    /// `BackendError::InvalidTable` if the store writes positions to a column other than
    /// the configured `position_column`.
    pub fn new(store: Arc<dyn PositionStore>, config: ListConfig) -> Result<Self> {
        if let Some(column) = store.position_column() {
            if column != config.position_column {
                return Err(BackendError::InvalidTable {
                    reason: format!(
                        "the list is configured with position column '{}' but the store writes '{column}'",
                        config.position_column
                    ),
                }
                .into());
            }
        }
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PositionStore> {
        &self.store
    }

    /// Position of the first item of every list.
    pub fn top_of_list(&self) -> i64 {
        self.config.top_of_list
    }

    /// Moves the item to `position` (the top of the list when `None`), shifting the items
    /// in between.
    ///
    /// An item that is not in the list enters it at `position` and every item at or below
    /// that position moves down by one.
    pub async fn insert_at(&self, item: &mut ListItem, position: Option<i64>) -> Result<()> {
        let target = position.unwrap_or(self.config.top_of_list);
        let scope = evaluator::persisted_scope(item)?;

        let mut tx = self.store.begin().await?;
        let current = stored_position(tx.as_mut(), item).await?;
        self.insert_at_position(tx.as_mut(), &scope, item.id(), current, target)
            .await?;
        tx.commit().await?;

        item.position_mut().reset(Some(target));
        Ok(())
    }

    /// Swaps the item with the next item down the list.
    pub async fn move_lower(&self, item: &mut ListItem) -> Result<()> {
        self.swap_with_neighbour(item, Direction::Asc).await
    }

    /// Swaps the item with the next item up the list.
    pub async fn move_higher(&self, item: &mut ListItem) -> Result<()> {
        self.swap_with_neighbour(item, Direction::Desc).await
    }

    /// Moves the item to the bottom of its list. No-op when it is not in the list.
    pub async fn move_to_bottom(&self, item: &mut ListItem) -> Result<()> {
        if item.is_not_in_list() {
            return Ok(());
        }
        let scope = evaluator::persisted_scope(item)?;

        let mut tx = self.store.begin().await?;
        let Some(position) = stored_position(tx.as_mut(), item).await? else {
            return Ok(());
        };
        self.decrement(
            tx.as_mut(),
            &scope,
            &PositionRange::lower_than(position).excluding(item.id()),
        )
        .await?;
        let bottom = self
            .bottom_position_in(tx.as_mut(), &scope, Some(item.id()))
            .await?
            .map_or(self.config.top_of_list, |bottom| bottom + 1);
        tx.set_position(item.id(), Some(bottom)).await?;
        tx.commit().await?;

        item.position_mut().reset(Some(bottom));
        Ok(())
    }

    /// Moves the item to the top of its list. No-op when it is not in the list.
    pub async fn move_to_top(&self, item: &mut ListItem) -> Result<()> {
        if item.is_not_in_list() {
            return Ok(());
        }
        let scope = evaluator::persisted_scope(item)?;
        let top = self.config.top_of_list;

        let mut tx = self.store.begin().await?;
        let Some(position) = stored_position(tx.as_mut(), item).await? else {
            return Ok(());
        };
        self.increment(
            tx.as_mut(),
            &scope,
            &PositionRange::higher_than(position).excluding(item.id()),
        )
        .await?;
        tx.set_position(item.id(), Some(top)).await?;
        tx.commit().await?;

        item.position_mut().reset(Some(top));
        Ok(())
    }

    /// Takes the item out of its list and closes the gap it leaves.
    pub async fn remove_from_list(&self, item: &mut ListItem) -> Result<()> {
        if item.is_not_in_list() {
            return Ok(());
        }
        let scope = evaluator::persisted_scope(item)?;

        let mut tx = self.store.begin().await?;
        let Some(position) = stored_position(tx.as_mut(), item).await? else {
            return Ok(());
        };
        self.decrement(
            tx.as_mut(),
            &scope,
            &PositionRange::lower_than(position).excluding(item.id()),
        )
        .await?;
        tx.set_position(item.id(), None).await?;
        tx.commit().await?;

        item.position_mut().reset(None);
        Ok(())
    }

    /// Adds one to the item's pending position without touching any other item.
    ///
    /// The change is reconciled against the rest of the list when the item is saved
    /// through [`Lifecycle`](crate::Lifecycle).
    pub fn increment_position(&self, item: &mut ListItem) {
        if let Some(position) = item.position() {
            item.set_position(Some(position + 1));
        }
    }

    /// Subtracts one from the item's pending position without touching any other item.
    ///
    /// See [`increment_position`](Self::increment_position).
    pub fn decrement_position(&self, item: &mut ListItem) {
        if let Some(position) = item.position() {
            item.set_position(Some(position - 1));
        }
    }

    /// The item directly above this one.
    pub async fn higher_item(&self, item: &ListItem) -> Result<Option<ListedItem>> {
        Ok(self.higher_items(item, Some(1)).await?.into_iter().next())
    }

    /// Items above this one, nearest first: the item directly above comes first and the
    /// top of the list last. `limit` keeps the nearest `limit` items.
    pub async fn higher_items(
        &self,
        item: &ListItem,
        limit: Option<usize>,
    ) -> Result<Vec<ListedItem>> {
        self.neighbours(item, Direction::Desc, limit).await
    }

    /// The item directly below this one.
    pub async fn lower_item(&self, item: &ListItem) -> Result<Option<ListedItem>> {
        Ok(self.lower_items(item, Some(1)).await?.into_iter().next())
    }

    /// Items below this one, nearest first.
    pub async fn lower_items(
        &self,
        item: &ListItem,
        limit: Option<usize>,
    ) -> Result<Vec<ListedItem>> {
        self.neighbours(item, Direction::Asc, limit).await
    }

    pub async fn is_first(&self, item: &ListItem) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let position = stored_position(tx.as_mut(), item).await?;
        tx.commit().await?;
        Ok(position == Some(self.config.top_of_list))
    }

    pub async fn is_last(&self, item: &ListItem) -> Result<bool> {
        if item.is_not_in_list() {
            return Ok(false);
        }
        let scope = evaluator::persisted_scope(item)?;

        let mut tx = self.store.begin().await?;
        let position = stored_position(tx.as_mut(), item).await?;
        let bottom = self.bottom_position_in(tx.as_mut(), &scope, None).await?;
        tx.commit().await?;
        Ok(position.is_some() && position == bottom)
    }

    /// The largest position in the item's list, `None` for an empty list.
    pub async fn bottom_position(&self, item: &ListItem) -> Result<Option<i64>> {
        let scope = evaluator::persisted_scope(item)?;
        let mut tx = self.store.begin().await?;
        let bottom = self.bottom_position_in(tx.as_mut(), &scope, None).await?;
        tx.commit().await?;
        Ok(bottom)
    }

    /// Number of items in the item's list.
    pub async fn list_len(&self, item: &ListItem) -> Result<i64> {
        let scope = evaluator::persisted_scope(item)?;
        let mut tx = self.store.begin().await?;
        let len = tx.count(&scope, &PositionRange::all()).await?;
        tx.commit().await?;
        Ok(len)
    }

    async fn swap_with_neighbour(&self, item: &mut ListItem, direction: Direction) -> Result<()> {
        if item.is_not_in_list() {
            return Ok(());
        }
        let scope = evaluator::persisted_scope(item)?;

        let mut tx = self.store.begin().await?;
        let Some(position) = stored_position(tx.as_mut(), item).await? else {
            return Ok(());
        };
        let neighbours =
            neighbours_of(tx.as_mut(), &scope, item.id(), position, direction, Some(1)).await?;
        let Some(neighbour) = neighbours.into_iter().next() else {
            return Ok(());
        };
        tx.set_position(&neighbour.id, Some(position)).await?;
        tx.set_position(item.id(), Some(neighbour.position)).await?;
        tx.commit().await?;

        debug!(
            id = %item.id(),
            from = position,
            to = neighbour.position,
            neighbour = %neighbour.id,
            "Swapped positions"
        );
        item.position_mut().reset(Some(neighbour.position));
        Ok(())
    }

    async fn neighbours(
        &self,
        item: &ListItem,
        direction: Direction,
        limit: Option<usize>,
    ) -> Result<Vec<ListedItem>> {
        if item.is_not_in_list() {
            return Ok(Vec::new());
        }
        let scope = evaluator::persisted_scope(item)?;

        let mut tx = self.store.begin().await?;
        let Some(position) = stored_position(tx.as_mut(), item).await? else {
            return Ok(Vec::new());
        };
        let items = neighbours_of(tx.as_mut(), &scope, item.id(), position, direction, limit).await?;
        tx.commit().await?;
        Ok(items)
    }

    /// Moves the item from `current` to `target`, shifting the items in between, and
    /// writes its new position.
    pub(crate) async fn insert_at_position(
        &self,
        tx: &mut dyn PositionTransaction,
        scope: &ResolvedScope,
        id: &ItemId,
        current: Option<i64>,
        target: i64,
    ) -> Result<()> {
        if current == Some(target) {
            return Ok(());
        }
        self.shuffle(tx, scope, id, current, target).await?;
        tx.set_position(id, Some(target)).await
    }

    /// Shifts the items between `old` and `new` so that `new` is free for `id`.
    ///
    /// Moving down (`old < new`) lifts `(old, new]` by one; moving up pushes `[new, old)`
    /// down by one. Entering the list (`old == None`) pushes everything from `new` down.
    pub(crate) async fn shuffle(
        &self,
        tx: &mut dyn PositionTransaction,
        scope: &ResolvedScope,
        id: &ItemId,
        old: Option<i64>,
        new: i64,
    ) -> Result<()> {
        match old {
            Some(old) if old == new => Ok(()),
            Some(old) if old < new => {
                let range = PositionRange::between(Bound::Excluded(old), Bound::Included(new))
                    .excluding(id);
                self.decrement(tx, scope, &range).await.map(|_| ())
            }
            Some(old) => {
                let range = PositionRange::between(Bound::Included(new), Bound::Excluded(old))
                    .excluding(id);
                self.increment(tx, scope, &range).await.map(|_| ())
            }
            None => {
                let range = PositionRange::at_least(new).excluding(id);
                self.increment(tx, scope, &range).await.map(|_| ())
            }
        }
    }

    /// Picks the position of an item entering `scope` according to the placement policy.
    pub(crate) async fn place(
        &self,
        tx: &mut dyn PositionTransaction,
        scope: &ResolvedScope,
        id: &ItemId,
    ) -> Result<Option<i64>> {
        match self.config.placement {
            Placement::Top => {
                self.increment(tx, scope, &PositionRange::all().excluding(id))
                    .await?;
                Ok(Some(self.config.top_of_list))
            }
            Placement::Bottom => Ok(Some(
                self.bottom_position_in(tx, scope, Some(id))
                    .await?
                    .map_or(self.config.top_of_list, |bottom| bottom + 1),
            )),
            Placement::None => Ok(None),
        }
    }

    pub(crate) async fn bottom_position_in(
        &self,
        tx: &mut dyn PositionTransaction,
        scope: &ResolvedScope,
        except: Option<&ItemId>,
    ) -> Result<Option<i64>> {
        let mut range = PositionRange::all();
        if let Some(id) = except {
            range = range.excluding(id);
        }
        let bottom = tx
            .select_ordered(scope, &range, Direction::Desc, Some(1))
            .await?;
        Ok(bottom.first().map(|item| item.position))
    }

    pub(crate) async fn increment(
        &self,
        tx: &mut dyn PositionTransaction,
        scope: &ResolvedScope,
        range: &PositionRange,
    ) -> Result<u64> {
        let rows = tx.increment_where(scope, range).await?;
        debug!(%scope, %range, rows, "Incremented positions");
        Ok(rows)
    }

    pub(crate) async fn decrement(
        &self,
        tx: &mut dyn PositionTransaction,
        scope: &ResolvedScope,
        range: &PositionRange,
    ) -> Result<u64> {
        let rows = tx.decrement_where(scope, range).await?;
        debug!(%scope, %range, rows, "Decremented positions");
        Ok(rows)
    }
}

/// The position the store holds for the item; items never saved have none.
async fn stored_position(
    tx: &mut dyn PositionTransaction,
    item: &ListItem,
) -> Result<Option<i64>> {
    if !item.is_persisted() {
        return Ok(None);
    }
    tx.get_position(item.id()).await
}

/// Items below (`Asc`) or above (`Desc`) `position`, nearest first.
async fn neighbours_of(
    tx: &mut dyn PositionTransaction,
    scope: &ResolvedScope,
    id: &ItemId,
    position: i64,
    direction: Direction,
    limit: Option<usize>,
) -> Result<Vec<ListedItem>> {
    let range = match direction {
        Direction::Asc => PositionRange::lower_than(position),
        Direction::Desc => PositionRange::higher_than(position),
    };
    tx.select_ordered(scope, &range.excluding(id), direction, limit)
        .await
}
