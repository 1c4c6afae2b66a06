//! SQL statement rendering for the position store.
//!
//! Scope predicates are trusted canonical strings and are inlined. Positions, ids and
//! attribute values are always bound as `$n` parameters, which both SQLite and
//! PostgreSQL accept.

use std::fmt::Write as _;
use std::ops::Bound;

use sqlx::any::{AnyArguments, AnyRow};
use sqlx::{Any, Row};

use super::TableSpec;
use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{Direction, PositionRange};
use crate::item::{Value, ValueKind};
use crate::scope::ResolvedScope;

pub(crate) type AnyQuery<'q> = sqlx::query::Query<'q, Any, AnyArguments<'q>>;

/// A bound parameter, typed by its column so nulls bind with the right SQL type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
}

impl Arg {
    /// Converts an attribute value for a column of the given kind.
    pub(crate) fn for_column(column: &str, kind: ValueKind, value: &Value) -> Result<Self> {
        Ok(match (kind, value) {
            (ValueKind::Bool | ValueKind::Int, Value::Null) => Arg::Int(None),
            (ValueKind::Float, Value::Null) => Arg::Float(None),
            (ValueKind::Text, Value::Null) => Arg::Text(None),
            (ValueKind::Bool, Value::Bool(b)) => Arg::Int(Some(i64::from(*b))),
            (ValueKind::Int, Value::Int(n)) => Arg::Int(Some(*n)),
            (ValueKind::Float, Value::Float(f)) => Arg::Float(Some(*f)),
            (ValueKind::Float, Value::Int(n)) => Arg::Float(Some(*n as f64)),
            (ValueKind::Text, Value::Text(s)) => Arg::Text(Some(s.clone())),
            _ => {
                return Err(BackendError::TypeMismatch {
                    column: column.to_string(),
                    expected: kind.name(),
                    actual: value.type_name(),
                }
                .into());
            }
        })
    }
}

/// SQL text plus its positional parameters.
#[derive(Debug, Default)]
pub(crate) struct Statement {
    pub(crate) sql: String,
    pub(crate) args: Vec<Arg>,
}

impl Statement {
    pub(crate) fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Appends a `$n` placeholder for the argument.
    pub(crate) fn bind(&mut self, arg: Arg) -> &mut Self {
        self.args.push(arg);
        let _ = write!(self.sql, "${}", self.args.len());
        self
    }

    /// Appends `WHERE (scope) AND position IS NOT NULL` plus the range conditions.
    pub(crate) fn push_where(
        &mut self,
        spec: &TableSpec,
        scope: &ResolvedScope,
        range: &PositionRange,
    ) -> &mut Self {
        let position = &spec.position_column;
        let _ = write!(
            self.sql,
            " WHERE ({}) AND {position} IS NOT NULL",
            scope.canonical()
        );
        match range.lower {
            Bound::Included(lower) => {
                self.push(&format!(" AND {position} >= ")).bind(Arg::Int(Some(lower)));
            }
            Bound::Excluded(lower) => {
                self.push(&format!(" AND {position} > ")).bind(Arg::Int(Some(lower)));
            }
            Bound::Unbounded => {}
        }
        match range.upper {
            Bound::Included(upper) => {
                self.push(&format!(" AND {position} <= ")).bind(Arg::Int(Some(upper)));
            }
            Bound::Excluded(upper) => {
                self.push(&format!(" AND {position} < ")).bind(Arg::Int(Some(upper)));
            }
            Bound::Unbounded => {}
        }
        if let Some(id) = &range.exclude {
            self.push(&format!(" AND {} <> ", spec.id_column))
                .bind(Arg::Text(Some(id.to_string())));
        }
        self
    }

    pub(crate) fn query(&self) -> AnyQuery<'_> {
        self.args
            .iter()
            .cloned()
            .fold(sqlx::query(&self.sql), |query, arg| match arg {
                Arg::Int(v) => query.bind(v),
                Arg::Float(v) => query.bind(v),
                Arg::Text(v) => query.bind(v),
            })
    }
}

pub(crate) fn count(spec: &TableSpec, scope: &ResolvedScope, range: &PositionRange) -> Statement {
    let mut stmt = Statement::new(format!("SELECT COUNT(*) FROM {}", spec.table));
    stmt.push_where(spec, scope, range);
    stmt
}

pub(crate) fn select_ordered(
    spec: &TableSpec,
    scope: &ResolvedScope,
    range: &PositionRange,
    direction: Direction,
    limit: Option<usize>,
) -> Statement {
    let mut stmt = Statement::new(format!(
        "SELECT {}, {} FROM {}",
        spec.id_column, spec.position_column, spec.table
    ));
    stmt.push_where(spec, scope, range);
    let order = match direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    };
    let _ = write!(
        stmt.sql,
        " ORDER BY {} {order}, {} {order}",
        spec.position_column, spec.id_column
    );
    if let Some(limit) = limit {
        let _ = write!(stmt.sql, " LIMIT {limit}");
    }
    stmt
}

/// `UPDATE .. SET position = position + delta` over the matching rows.
pub(crate) fn shift(
    spec: &TableSpec,
    scope: &ResolvedScope,
    range: &PositionRange,
    delta: i64,
) -> Statement {
    let position = &spec.position_column;
    let op = if delta < 0 { "-" } else { "+" };
    let mut stmt = Statement::new(format!(
        "UPDATE {} SET {position} = {position} {op} {}",
        spec.table,
        delta.abs()
    ));
    stmt.push_where(spec, scope, range);
    stmt
}

pub(crate) fn select_row(spec: &TableSpec) -> String {
    let mut columns = vec![spec.id_column.as_str(), spec.position_column.as_str()];
    columns.extend(spec.columns.iter().map(|(name, _)| name.as_str()));
    format!(
        "SELECT {} FROM {} WHERE {} = $1",
        columns.join(", "),
        spec.table,
        spec.id_column
    )
}

/// Decodes one attribute column by its declared kind.
pub(crate) fn decode_value(
    row: &AnyRow,
    index: usize,
    kind: ValueKind,
) -> std::result::Result<Value, sqlx::Error> {
    let value = match kind {
        ValueKind::Bool => row
            .try_get::<Option<i64>, _>(index)?
            .map(|n| Value::Bool(n != 0)),
        ValueKind::Int => row.try_get::<Option<i64>, _>(index)?.map(Value::Int),
        ValueKind::Float => row.try_get::<Option<f64>, _>(index)?.map(Value::Float),
        ValueKind::Text => row.try_get::<Option<String>, _>(index)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}
