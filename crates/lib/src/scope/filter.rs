//! Derived scope filters.
//!
//! A [`Filter`] is a host-supplied list of `column <op> value` clauses. It is rendered in
//! two steps: first into a template with `?` placeholders plus its bindings, then into a
//! canonical predicate with every placeholder replaced by the literal text of its binding.
//! The canonical form is what scope-change detection compares, so rendering is purely a
//! function of the clause list.

use serde::Deserialize;

use super::{ScopeError, is_identifier};
use crate::item::{Attributes, Value};

/// How a clause connects to the clauses before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Join {
    #[default]
    And,
    Or,
}

/// Comparison operator of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Comparison {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=", alias = "<>")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "is null")]
    IsNull,
    #[serde(rename = "is not null")]
    IsNotNull,
}

impl Comparison {
    fn sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::NotEq => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::IsNull => "IS NULL",
            Comparison::IsNotNull => "IS NOT NULL",
        }
    }

    /// Null checks take no operand.
    fn takes_value(&self) -> bool {
        !matches!(self, Comparison::IsNull | Comparison::IsNotNull)
    }
}

/// One `column <op> value` condition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Clause {
    #[serde(default)]
    pub join: Join,
    pub column: String,
    pub op: Comparison,
    #[serde(default)]
    pub value: Value,
}

impl Clause {
    fn matches(&self, attributes: &Attributes) -> bool {
        let null = Value::Null;
        let actual = attributes.get(&self.column).unwrap_or(&null);
        let ordering = match self.op {
            Comparison::IsNull => return actual.is_null(),
            Comparison::IsNotNull => return !actual.is_null(),
            _ => actual.sql_cmp(&self.value),
        };
        ordering.is_some_and(|ord| match self.op {
            Comparison::Eq => ord.is_eq(),
            Comparison::NotEq => ord.is_ne(),
            Comparison::Lt => ord.is_lt(),
            Comparison::Le => ord.is_le(),
            Comparison::Gt => ord.is_gt(),
            Comparison::Ge => ord.is_ge(),
            Comparison::IsNull | Comparison::IsNotNull => false,
        })
    }
}

/// A filter definition delimiting a derived scope.
///
/// Two filters select the same list when they render the same canonical predicate.
/// Rendering follows clause order, so filters whose clauses differ only in order
/// (`a = 1 AND b = 2` and `b = 2 AND a = 1`) are treated as different lists.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    clauses: Vec<Clause>,
}

/// A filter rendered with `?` placeholders, before literal substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateTemplate {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl PredicateTemplate {
    /// Replaces each placeholder with the SQL literal of its binding.
    ///
    /// Placeholders without a binding are left as they are.
    pub fn inline(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut bindings = self.bindings.iter();
        for (i, chunk) in self.sql.split('?').enumerate() {
            if i > 0 {
                match bindings.next() {
                    Some(value) => out.push_str(&value.to_sql_literal()),
                    None => out.push('?'),
                }
            }
            out.push_str(chunk);
        }
        out
    }
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Appends a clause joined with `AND`.
    pub fn and(mut self, column: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause {
            join: Join::And,
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Appends a clause joined with `OR`.
    pub fn or(mut self, column: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause {
            join: Join::Or,
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Shorthand for `and(column, Comparison::Eq, value)`.
    pub fn equals(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(column, Comparison::Eq, value)
    }

    /// Checks that the filter can be rendered safely.
    pub fn validate(&self) -> Result<(), ScopeError> {
        if self.clauses.is_empty() {
            return Err(ScopeError::InvalidQuery {
                reason: "the scope filter has no clauses, so it cannot delimit a list".to_string(),
            });
        }
        for clause in &self.clauses {
            if !is_identifier(&clause.column) {
                return Err(ScopeError::invalid_scope(format!(
                    "filter column '{}' is not a plain SQL identifier",
                    clause.column
                )));
            }
            if !clause.value.is_finite() {
                return Err(ScopeError::invalid_scope(format!(
                    "filter value for '{}' is not a finite number",
                    clause.column
                )));
            }
        }
        Ok(())
    }

    /// Renders the filter with `?` placeholders.
    pub fn template(&self) -> PredicateTemplate {
        let mut sql = String::new();
        let mut bindings = Vec::new();
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                sql.push_str(match clause.join {
                    Join::And => " AND ",
                    Join::Or => " OR ",
                });
            }
            sql.push_str(&clause.column);
            sql.push(' ');
            sql.push_str(clause.op.sql());
            if clause.op.takes_value() {
                sql.push_str(" ?");
                bindings.push(clause.value.clone());
            }
        }
        PredicateTemplate { sql, bindings }
    }

    /// Renders the canonical predicate with literals inlined.
    pub fn to_predicate(&self) -> String {
        self.template().inline()
    }

    /// Evaluates the filter against a row, `AND` binding tighter than `OR`.
    pub fn matches(&self, attributes: &Attributes) -> bool {
        let mut any_group = false;
        let mut group = true;
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 && clause.join == Join::Or {
                any_group |= group;
                group = true;
            }
            group &= clause.matches(attributes);
        }
        !self.clauses.is_empty() && (any_group || group)
    }
}
