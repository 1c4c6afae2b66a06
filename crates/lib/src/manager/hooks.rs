//! Lifecycle hooks.
//!
//! A host that persists rows itself calls these hooks around its own writes, inside the
//! transaction it writes with. [`Lifecycle`](crate::Lifecycle) is the ready-made adapter
//! that does exactly that.

use async_trait::async_trait;
use tracing::{info, warn};

use super::PositionManager;
use crate::Result;
use crate::backend::{PositionRange, PositionTransaction};
use crate::config::Placement;
use crate::item::ListItem;
use crate::scope::{ResolvedScope, evaluator};

/// Callbacks run at the create, update and delete boundaries of an item.
#[async_trait]
pub trait ListHooks: Send + Sync {
    /// Runs before the row is inserted; may set the item's pending position.
    async fn before_create(
        &self,
        tx: &mut dyn PositionTransaction,
        item: &mut ListItem,
    ) -> Result<()>;

    /// Runs before the row is updated; moves the item between lists on a scope change.
    async fn before_update(
        &self,
        tx: &mut dyn PositionTransaction,
        item: &mut ListItem,
    ) -> Result<()>;

    /// Runs after the row is updated; reconciles a position that was set directly.
    async fn after_update(&self, tx: &mut dyn PositionTransaction, item: &mut ListItem)
    -> Result<()>;

    /// Runs before the row is deleted.
    async fn before_delete(
        &self,
        tx: &mut dyn PositionTransaction,
        item: &mut ListItem,
    ) -> Result<()>;

    /// Runs after the row is deleted; closes the gap it left.
    async fn after_delete(&self, tx: &mut dyn PositionTransaction, item: &mut ListItem)
    -> Result<()>;
}

#[async_trait]
impl ListHooks for PositionManager {
    /// Applies the placement policy to an item created without a position.
    ///
    /// An item created with an explicit position keeps it, and the items at and below
    /// that position move down to make room. An item that enters no list is created
    /// without resolving its scope, so its foreign key may still be null.
    async fn before_create(
        &self,
        tx: &mut dyn PositionTransaction,
        item: &mut ListItem,
    ) -> Result<()> {
        match item.position() {
            Some(position) => {
                let scope = evaluator::current_scope(item)?;
                self.increment(
                    tx,
                    &scope,
                    &PositionRange::at_least(position).excluding(item.id()),
                )
                .await?;
            }
            None if self.config().placement == Placement::None => return Ok(()),
            None => {
                let scope = evaluator::current_scope(item)?;
                let position = self.place(tx, &scope, item.id()).await?;
                item.set_position(position);
            }
        }
        evaluator::observe(item)?;
        Ok(())
    }

    /// Moves the item between lists when its scope changed.
    ///
    /// The persisted position is re-read from the store first, so a stale handle closes
    /// the gap the row actually leaves and a directly set position is reconciled against
    /// the stored one.
    async fn before_update(
        &self,
        tx: &mut dyn PositionTransaction,
        item: &mut ListItem,
    ) -> Result<()> {
        let stored = tx.get_position(item.id()).await?;
        item.position_mut().refresh(stored);

        if !evaluator::has_scope_changed(item)? {
            return Ok(());
        }

        let old_scope = match stored {
            Some(position) => {
                let scope = evaluator::persisted_scope(item)?;
                self.decrement(
                    tx,
                    &scope,
                    &PositionRange::lower_than(position).excluding(item.id()),
                )
                .await?;
                Some(scope)
            }
            None => None,
        };
        let new_scope = evaluator::current_scope(item)?;

        let position = self.place(tx, &new_scope, item.id()).await?;
        tx.set_position(item.id(), position).await?;
        item.position_mut().reset(position);
        evaluator::rebase(item)?;

        info!(
            id = %item.id(),
            from = ?old_scope.as_ref().map(ResolvedScope::canonical),
            to = %new_scope,
            ?position,
            "Moved item to a new list"
        );
        Ok(())
    }

    async fn after_update(
        &self,
        tx: &mut dyn PositionTransaction,
        item: &mut ListItem,
    ) -> Result<()> {
        let old = item.persisted_position();
        let new = item.position();
        if old == new {
            return Ok(());
        }
        let scope = evaluator::current_scope(item)?;

        match new {
            Some(new) => {
                let taken = tx
                    .count(&scope, &PositionRange::at(new).excluding(item.id()))
                    .await?;
                if taken == 0 {
                    return Ok(());
                }
                warn!(id = %item.id(), ?old, new, "Position was already taken, shifting the list");
                self.shuffle(tx, &scope, item.id(), old, new).await
            }
            None => {
                if let Some(old) = old {
                    self.decrement(
                        tx,
                        &scope,
                        &PositionRange::lower_than(old).excluding(item.id()),
                    )
                    .await?;
                }
                Ok(())
            }
        }
    }

    /// Replaces any pending position with the stored one, which is the gap
    /// `after_delete` closes.
    async fn before_delete(
        &self,
        tx: &mut dyn PositionTransaction,
        item: &mut ListItem,
    ) -> Result<()> {
        let stored = tx.get_position(item.id()).await?;
        item.position_mut().reset(stored);
        Ok(())
    }

    async fn after_delete(
        &self,
        tx: &mut dyn PositionTransaction,
        item: &mut ListItem,
    ) -> Result<()> {
        let Some(position) = item.persisted_position() else {
            return Ok(());
        };
        let scope = evaluator::persisted_scope(item)?;
        self.decrement(tx, &scope, &PositionRange::lower_than(position))
            .await?;
        Ok(())
    }
}
