//! List scopes.
//!
//! Several lists can share one table; a [`Scope`] is the predicate that picks the rows
//! of one list. A scope definition is resolved against an item's attributes into a
//! [`ResolvedScope`], whose canonical predicate string is what gets compared to detect
//! scope changes and what SQL backends put in their `WHERE` clause.

mod errors;
pub mod evaluator;
mod filter;

pub use errors::ScopeError;
pub use filter::{Clause, Comparison, Filter, Join, PredicateTemplate};

use crate::constants::DEFAULT_SCOPE;
use crate::item::{Attributes, Value};

/// A scope definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// A literal SQL predicate, used verbatim. The host is responsible for its safety.
    Raw(String),
    /// Equality on a foreign-key attribute of the item.
    ForeignKey { column: String },
    /// A predicate rendered from a host filter definition.
    Derived(Filter),
}

impl Scope {
    pub fn raw(predicate: impl Into<String>) -> Self {
        Scope::Raw(predicate.into())
    }

    pub fn foreign_key(column: impl Into<String>) -> Self {
        Scope::ForeignKey {
            column: column.into(),
        }
    }

    pub fn derived(filter: Filter) -> Self {
        Scope::Derived(filter)
    }

    /// Parses a scope from its JSON configuration form.
    ///
    /// * `null` is an absent scope (`Ok(None)`)
    /// * a string is a raw predicate
    /// * `{"foreign_key": "column"}` is a foreign-key scope
    /// * `{"filter": [clauses..]}` is a derived scope
    ///
    /// Anything else is rejected with [`ScopeError::InvalidScope`].
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Scope>, ScopeError> {
        use serde_json::Value as Json;

        const EXPECTED: &str =
            "expected a predicate string, a {\"foreign_key\": ..} object or a {\"filter\": [..]} object";

        match value {
            Json::Null => Ok(None),
            Json::String(predicate) => Ok(Some(Scope::Raw(predicate.clone()))),
            Json::Object(map) if map.len() == 1 => {
                if let Some(column) = map.get("foreign_key") {
                    return match column {
                        Json::String(column) => Ok(Some(Scope::foreign_key(column.clone()))),
                        other => Err(ScopeError::invalid_scope(format!(
                            "foreign_key must name a column, found {other}"
                        ))),
                    };
                }
                if let Some(clauses) = map.get("filter") {
                    return serde_json::from_value::<Filter>(clauses.clone())
                        .map(|filter| Some(Scope::Derived(filter)))
                        .map_err(|e| ScopeError::invalid_scope(format!("unreadable filter: {e}")));
                }
                Err(ScopeError::invalid_scope(EXPECTED))
            }
            _ => Err(ScopeError::invalid_scope(EXPECTED)),
        }
    }

    /// Resolves this definition against a set of attributes.
    pub fn resolve(&self, attributes: &Attributes) -> Result<ResolvedScope, ScopeError> {
        match self {
            Scope::Raw(predicate) => {
                let predicate = predicate.trim();
                if predicate.is_empty() {
                    return Err(ScopeError::invalid_scope("the raw predicate is blank"));
                }
                Ok(ResolvedScope::Raw(predicate.to_string()))
            }
            Scope::ForeignKey { column } => {
                if !is_identifier(column) {
                    return Err(ScopeError::invalid_scope(format!(
                        "foreign key '{column}' is not a plain SQL identifier"
                    )));
                }
                match attributes.get(column) {
                    None | Some(Value::Null) => Err(ScopeError::NullForeignKey {
                        column: column.clone(),
                    }),
                    Some(value) => {
                        let filter = Filter::new().equals(column.clone(), value.clone());
                        filter.validate()?;
                        Ok(ResolvedScope::Filter(filter))
                    }
                }
            }
            Scope::Derived(filter) => {
                filter.validate()?;
                Ok(ResolvedScope::Filter(filter.clone()))
            }
        }
    }
}

/// Resolves an optional scope definition; a missing definition is [`ScopeError::NullScope`].
pub fn resolve(scope: Option<&Scope>, attributes: &Attributes) -> Result<ResolvedScope, ScopeError> {
    scope.ok_or(ScopeError::NullScope)?.resolve(attributes)
}

/// A scope resolved for one item: the concrete predicate of the list it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedScope {
    /// A literal predicate
    Raw(String),
    /// A structured predicate; foreign-key scopes resolve to a single equality clause
    Filter(Filter),
}

impl ResolvedScope {
    /// The canonical predicate string.
    ///
    /// Two resolved scopes select the same list exactly when their canonical strings are equal.
    pub fn canonical(&self) -> String {
        match self {
            ResolvedScope::Raw(predicate) => predicate.clone(),
            ResolvedScope::Filter(filter) => filter.to_predicate(),
        }
    }

    /// Returns true for the predicate matching every row.
    pub fn is_match_all(&self) -> bool {
        match self {
            ResolvedScope::Raw(predicate) => {
                normalize_whitespace(predicate) == normalize_whitespace(DEFAULT_SCOPE)
            }
            ResolvedScope::Filter(_) => false,
        }
    }

    /// Returns true when both scopes select the same list.
    pub fn same_list(&self, other: &ResolvedScope) -> bool {
        self.canonical() == other.canonical()
    }
}

impl std::fmt::Display for ResolvedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns true for plain, optionally table-qualified SQL identifiers (`list_id`, `foos.list_id`).
pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
