//! Host persistence adapter.
//!
//! [`Lifecycle`] persists items through the store and runs the [`ListHooks`] of its
//! [`PositionManager`] around every write, all inside one transaction:
//!
//! ```text
//! create:  before_create -> insert -> commit
//! save:    before_update -> update -> after_update -> commit
//! delete:  before_delete -> delete -> after_delete -> commit
//! ```
//!
//! Hooks run against a copy of the item; the caller's item is only updated once the
//! transaction has committed.

use std::sync::Arc;

use crate::Result;
use crate::backend::PositionStore;
use crate::config::ListConfig;
use crate::item::{ItemId, ListItem};
use crate::manager::{ListHooks, PositionManager};

/// Persists list items and keeps their lists gapless.
pub struct Lifecycle {
    manager: PositionManager,
}

impl Lifecycle {
    /// See [`PositionManager::new`] for the checks made against the store.
    pub fn new(store: Arc<dyn PositionStore>, config: ListConfig) -> Result<Self> {
        Ok(Self {
            manager: PositionManager::new(store, config)?,
        })
    }

    /// The manager used for explicit moves on items of this table.
    pub fn manager(&self) -> &PositionManager {
        &self.manager
    }

    /// Loads an item by id.
    pub async fn fetch(&self, id: &ItemId) -> Result<ListItem> {
        let mut tx = self.manager.store().begin().await?;
        let row = tx.fetch(id).await?;
        tx.commit().await?;
        Ok(ListItem::from_row(row, self.manager.config()))
    }

    /// Inserts a new item, placing it in its list.
    pub async fn create(&self, item: &mut ListItem) -> Result<()> {
        let mut staged = item.clone();

        let mut tx = self.manager.store().begin().await?;
        self.manager.before_create(tx.as_mut(), &mut staged).await?;
        tx.insert(&staged.to_row()).await?;
        tx.commit().await?;

        staged.mark_persisted();
        *item = staged;
        Ok(())
    }

    /// Writes the pending changes of an item; new items are created instead.
    pub async fn save(&self, item: &mut ListItem) -> Result<()> {
        if !item.is_persisted() {
            return self.create(item).await;
        }
        let mut staged = item.clone();

        let mut tx = self.manager.store().begin().await?;
        self.manager.before_update(tx.as_mut(), &mut staged).await?;
        tx.update(&staged.to_row()).await?;
        self.manager.after_update(tx.as_mut(), &mut staged).await?;
        tx.commit().await?;

        staged.mark_persisted();
        *item = staged;
        Ok(())
    }

    /// Deletes an item and closes the gap it leaves.
    pub async fn delete(&self, item: &mut ListItem) -> Result<()> {
        let mut staged = item.clone();

        let mut tx = self.manager.store().begin().await?;
        self.manager.before_delete(tx.as_mut(), &mut staged).await?;
        tx.delete(staged.id()).await?;
        self.manager.after_delete(tx.as_mut(), &mut staged).await?;
        tx.commit().await?;

        staged.mark_deleted();
        *item = staged;
        Ok(())
    }

    /// Sets the item's position directly and saves it; the list is reconciled around it.
    pub async fn set_list_position(&self, item: &mut ListItem, position: Option<i64>) -> Result<()> {
        item.set_position(position);
        self.save(item).await
    }
}
