//! Scope-change detection.
//!
//! The evaluator keeps no state of its own: the baseline it compares against is cached on
//! the [`ListItem`] the first time its scope is observed.
//!
//! * Raw and derived scopes compare canonical predicate strings against the baseline.
//! * Foreign-key scopes compare the persisted key value against the pending one.

use super::{ResolvedScope, Scope, ScopeError, resolve};
use crate::item::{ListItem, Snapshot};

/// Resolves the scope of an item from one of its attribute snapshots.
pub fn resolve_at(item: &ListItem, snapshot: Snapshot) -> Result<ResolvedScope, ScopeError> {
    resolve(item.scope(), item.attributes().view(snapshot))
}

/// Resolves the scope the item will belong to once its pending changes are saved.
pub fn current_scope(item: &ListItem) -> Result<ResolvedScope, ScopeError> {
    resolve_at(item, Snapshot::Current)
}

/// Resolves the scope the item belongs to in storage.
///
/// Foreign-key scopes read the persisted attribute snapshot. Raw and derived scopes carry
/// no attribute dependency, so the cached baseline is the only record of the previous
/// predicate; without one the current definition is used.
pub fn persisted_scope(item: &ListItem) -> Result<ResolvedScope, ScopeError> {
    match (item.scope(), &item.scope_baseline) {
        (Some(Scope::ForeignKey { .. }), _) | (_, None) => resolve_at(item, Snapshot::Original),
        (_, Some(baseline)) => Ok(baseline.clone()),
    }
}

/// Caches the current scope as the item's baseline unless one is already cached.
pub fn observe(item: &mut ListItem) -> Result<(), ScopeError> {
    if item.scope_baseline.is_none() {
        item.scope_baseline = Some(current_scope(item)?);
    }
    Ok(())
}

/// Replaces the cached baseline with the current scope, after a change has been applied.
pub fn rebase(item: &mut ListItem) -> Result<(), ScopeError> {
    item.scope_baseline = Some(current_scope(item)?);
    Ok(())
}

/// Returns whether the item's scope has changed since it was last observed.
///
/// The first observation of a raw or derived scope caches it and reports no change.
pub fn has_scope_changed(item: &mut ListItem) -> Result<bool, ScopeError> {
    match item.scope() {
        None => Err(ScopeError::NullScope),
        Some(Scope::ForeignKey { column }) => {
            let attributes = item.attributes();
            Ok(attributes.original().get(column) != attributes.current().get(column))
        }
        Some(Scope::Raw(_) | Scope::Derived(_)) => {
            let current = current_scope(item)?;
            match &item.scope_baseline {
                None => {
                    item.scope_baseline = Some(current);
                    Ok(false)
                }
                Some(baseline) => Ok(!baseline.same_list(&current)),
            }
        }
    }
}
