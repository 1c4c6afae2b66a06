//! Orderable items.
//!
//! A [`ListItem`] is the in-memory view of one row: its identity, its position and the
//! attributes that decide which list it belongs to. Both the position and the attributes
//! are [`Tracked`], keeping what is persisted next to what is pending. Scope-change
//! detection and gap closing read the persisted view explicitly instead of swapping
//! attribute sets back and forth on the entity.

mod value;

pub use value::{Attributes, Value, ValueKind};

use serde::{Deserialize, Serialize};

use crate::config::ListConfig;
use crate::scope::{ResolvedScope, Scope};

/// Identity of a row; the table's primary key in textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new ItemId from any string-like input.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&ItemId> for ItemId {
    fn from(id: &ItemId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl PartialEq<&str> for ItemId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Which half of a [`Tracked`] value to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    /// The value as last persisted
    Original,
    /// The value including pending changes
    Current,
}

/// A value paired with its last persisted snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    original: T,
    current: T,
}

impl<T: Clone + PartialEq> Tracked<T> {
    /// Creates a tracked value whose original and current halves are equal.
    pub fn new(value: T) -> Self {
        Self {
            original: value.clone(),
            current: value,
        }
    }

    /// The persisted value.
    pub fn original(&self) -> &T {
        &self.original
    }

    /// The value including pending changes.
    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.current
    }

    /// Reads one half of the pair.
    pub fn view(&self, snapshot: Snapshot) -> &T {
        match snapshot {
            Snapshot::Original => &self.original,
            Snapshot::Current => &self.current,
        }
    }

    /// Replaces the pending value.
    pub fn set(&mut self, value: T) {
        self.current = value;
    }

    /// Returns true when the pending value differs from the persisted one.
    pub fn is_changed(&self) -> bool {
        self.original != self.current
    }

    /// Marks the pending value as persisted.
    pub fn commit(&mut self) {
        self.original = self.current.clone();
    }

    /// Drops the pending value, restoring the persisted one.
    pub fn revert(&mut self) {
        self.current = self.original.clone();
    }

    /// Sets both halves, for values written straight to storage.
    pub(crate) fn reset(&mut self, value: T) {
        self.original = value.clone();
        self.current = value;
    }

    /// Replaces the persisted half with a value re-read from storage. A pending change
    /// is kept; an unchanged value follows the stored one.
    pub(crate) fn refresh(&mut self, stored: T) {
        if !self.is_changed() {
            self.current = stored.clone();
        }
        self.original = stored;
    }
}

/// A persisted row as exchanged with a [`PositionStore`](crate::backend::PositionStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: ItemId,
    pub position: Option<i64>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ItemRow {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            position: None,
            attributes: Attributes::new(),
        }
    }
}

/// An item that can take part in an ordered list.
///
/// `position == None` means the item is not in its list.
#[derive(Debug, Clone)]
pub struct ListItem {
    id: ItemId,
    position: Tracked<Option<i64>>,
    attributes: Tracked<Attributes>,
    scope: Option<Scope>,
    persisted: bool,
    /// Canonical scope cached the first time the scope is observed on this item.
    pub(crate) scope_baseline: Option<ResolvedScope>,
}

impl ListItem {
    /// Creates a new, not yet persisted item using the list's configured scope.
    pub fn new(id: impl Into<ItemId>, config: &ListConfig) -> Self {
        Self {
            id: id.into(),
            position: Tracked::new(None),
            attributes: Tracked::new(Attributes::new()),
            scope: config.scope.clone(),
            persisted: false,
            scope_baseline: None,
        }
    }

    /// Builds the view of a row loaded from storage.
    ///
    /// The scope the row is stored under is cached as the baseline, so a scope replaced
    /// after loading is detected on the next update. A scope that does not resolve is
    /// left for the first operation to report.
    pub fn from_row(row: ItemRow, config: &ListConfig) -> Self {
        let scope_baseline = config
            .scope
            .as_ref()
            .and_then(|scope| scope.resolve(&row.attributes).ok());
        Self {
            id: row.id,
            position: Tracked::new(row.position),
            attributes: Tracked::new(row.attributes),
            scope: config.scope.clone(),
            persisted: true,
            scope_baseline,
        }
    }

    /// Sets an attribute on a new item (builder style).
    pub fn with_attribute(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(column, value);
        if !self.persisted {
            self.attributes.commit();
        }
        self
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// The position including pending changes.
    pub fn position(&self) -> Option<i64> {
        *self.position.current()
    }

    /// The position as last persisted.
    pub fn persisted_position(&self) -> Option<i64> {
        *self.position.original()
    }

    pub fn tracked_position(&self) -> &Tracked<Option<i64>> {
        &self.position
    }

    /// Sets the pending position. The manager reconciles it when the item is saved.
    pub fn set_position(&mut self, position: Option<i64>) {
        self.position.set(position);
    }

    /// Returns an attribute including pending changes; missing attributes read as null.
    pub fn attribute(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.attributes.current().get(column).unwrap_or(&NULL)
    }

    pub fn set_attribute(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.attributes
            .current_mut()
            .insert(column.into(), value.into());
    }

    pub fn attributes(&self) -> &Tracked<Attributes> {
        &self.attributes
    }

    /// The scope definition of this item, `None` if it was explicitly cleared.
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// Replaces the scope definition of this item.
    ///
    /// A changed scope is detected on the next update and moves the item between lists.
    pub fn set_scope(&mut self, scope: Option<Scope>) {
        self.scope = scope;
    }

    pub fn is_in_list(&self) -> bool {
        self.position().is_some()
    }

    pub fn is_not_in_list(&self) -> bool {
        self.position().is_none()
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Returns true when either the position or the attributes have pending changes.
    pub fn is_dirty(&self) -> bool {
        self.position.is_changed() || self.attributes.is_changed()
    }

    /// The row to write for the pending state of this item.
    pub fn to_row(&self) -> ItemRow {
        ItemRow {
            id: self.id.clone(),
            position: self.position(),
            attributes: self.attributes.current().clone(),
        }
    }

    pub(crate) fn position_mut(&mut self) -> &mut Tracked<Option<i64>> {
        &mut self.position
    }

    /// Records that the pending state has been written.
    pub(crate) fn mark_persisted(&mut self) {
        self.position.commit();
        self.attributes.commit();
        self.persisted = true;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.persisted = false;
    }
}
