//! Position directives for the SQL store.
//!
//! Every directive runs on the connection of one sqlx transaction. Dropping the
//! transaction without committing rolls it back.

use async_trait::async_trait;
use sqlx::{Any, Row, Transaction};

use super::query::{self, Arg, Statement};
use super::{SqlxResultExt, TableSpec};
use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{Direction, ListedItem, PositionRange, PositionTransaction};
use crate::item::{Attributes, ItemId, ItemRow};
use crate::scope::ResolvedScope;

pub(crate) struct SqlxTransaction {
    tx: Transaction<'static, Any>,
    spec: TableSpec,
}

impl SqlxTransaction {
    pub(crate) fn new(tx: Transaction<'static, Any>, spec: TableSpec) -> Self {
        Self { tx, spec }
    }

    async fn execute(&mut self, stmt: &Statement, context: &str) -> Result<u64> {
        let result = stmt
            .query()
            .execute(&mut *self.tx)
            .await
            .sql_context(context)?;
        Ok(result.rows_affected())
    }

    /// The bound values of a row's attributes, in table column order.
    fn attribute_args(&self, attributes: &Attributes) -> Result<Vec<Arg>> {
        if let Some(unknown) = attributes
            .keys()
            .find(|name| self.spec.column_kind(name).is_none())
        {
            return Err(BackendError::InvalidTable {
                reason: format!(
                    "attribute '{unknown}' has no column in table {}",
                    self.spec.table
                ),
            }
            .into());
        }

        self.spec
            .columns
            .iter()
            .map(|(name, kind)| {
                let value = attributes.get(name).cloned().unwrap_or_default();
                Arg::for_column(name, *kind, &value)
            })
            .collect()
    }

    fn not_found(id: &ItemId) -> crate::Error {
        BackendError::RowNotFound { id: id.clone() }.into()
    }
}

#[async_trait]
impl PositionTransaction for SqlxTransaction {
    async fn count(&mut self, scope: &ResolvedScope, range: &PositionRange) -> Result<i64> {
        let stmt = query::count(&self.spec, scope, range);
        let row = stmt
            .query()
            .fetch_one(&mut *self.tx)
            .await
            .sql_context("Failed to count list rows")?;
        row.try_get::<i64, _>(0)
            .sql_context("Failed to decode row count")
    }

    async fn select_ordered(
        &mut self,
        scope: &ResolvedScope,
        range: &PositionRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> Result<Vec<ListedItem>> {
        let stmt = query::select_ordered(&self.spec, scope, range, direction, limit);
        let rows = stmt
            .query()
            .fetch_all(&mut *self.tx)
            .await
            .sql_context("Failed to select list rows")?;

        rows.iter()
            .map(|row| {
                Ok(ListedItem {
                    id: ItemId::new(
                        row.try_get::<String, _>(0)
                            .sql_context("Failed to decode row id")?,
                    ),
                    position: row
                        .try_get::<i64, _>(1)
                        .sql_context("Failed to decode row position")?,
                })
            })
            .collect()
    }

    async fn increment_where(
        &mut self,
        scope: &ResolvedScope,
        range: &PositionRange,
    ) -> Result<u64> {
        let stmt = query::shift(&self.spec, scope, range, 1);
        self.execute(&stmt, "Failed to increment positions").await
    }

    async fn decrement_where(
        &mut self,
        scope: &ResolvedScope,
        range: &PositionRange,
    ) -> Result<u64> {
        let stmt = query::shift(&self.spec, scope, range, -1);
        self.execute(&stmt, "Failed to decrement positions").await
    }

    async fn get_position(&mut self, id: &ItemId) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1",
            self.spec.position_column, self.spec.table, self.spec.id_column
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .sql_context("Failed to read position")?
            .ok_or_else(|| Self::not_found(id))?;
        row.try_get::<Option<i64>, _>(0)
            .sql_context("Failed to decode position")
    }

    async fn set_position(&mut self, id: &ItemId, position: Option<i64>) -> Result<()> {
        let mut stmt = Statement::new(format!(
            "UPDATE {} SET {} = ",
            self.spec.table, self.spec.position_column
        ));
        stmt.bind(Arg::Int(position))
            .push(&format!(" WHERE {} = ", self.spec.id_column))
            .bind(Arg::Text(Some(id.to_string())));

        match self.execute(&stmt, "Failed to write position").await? {
            0 => Err(Self::not_found(id)),
            _ => Ok(()),
        }
    }

    async fn fetch(&mut self, id: &ItemId) -> Result<ItemRow> {
        let sql = query::select_row(&self.spec);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .sql_context("Failed to fetch row")?
            .ok_or_else(|| Self::not_found(id))?;

        let mut item = ItemRow::new(id);
        item.position = row
            .try_get::<Option<i64>, _>(1)
            .sql_context("Failed to decode position")?;
        for (offset, (name, kind)) in self.spec.columns.iter().enumerate() {
            let value = query::decode_value(&row, offset + 2, *kind)
                .sql_context(&format!("Failed to decode column {name}"))?;
            item.attributes.insert(name.clone(), value);
        }
        Ok(item)
    }

    async fn insert(&mut self, row: &ItemRow) -> Result<()> {
        let args = self.attribute_args(&row.attributes)?;

        let exists = sqlx::query(&format!(
            "SELECT 1 FROM {} WHERE {} = $1",
            self.spec.table, self.spec.id_column
        ))
        .bind(row.id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .sql_context("Failed to check for an existing row")?;
        if exists.is_some() {
            return Err(BackendError::DuplicateRow { id: row.id.clone() }.into());
        }

        let mut columns = vec![
            self.spec.id_column.as_str(),
            self.spec.position_column.as_str(),
        ];
        columns.extend(self.spec.columns.iter().map(|(name, _)| name.as_str()));

        let mut stmt = Statement::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            self.spec.table,
            columns.join(", ")
        ));
        stmt.bind(Arg::Text(Some(row.id.to_string())))
            .push(", ")
            .bind(Arg::Int(row.position));
        for arg in args {
            stmt.push(", ").bind(arg);
        }
        stmt.push(")");

        self.execute(&stmt, "Failed to insert row").await?;
        Ok(())
    }

    async fn update(&mut self, row: &ItemRow) -> Result<()> {
        let args = self.attribute_args(&row.attributes)?;

        let mut stmt = Statement::new(format!(
            "UPDATE {} SET {} = ",
            self.spec.table, self.spec.position_column
        ));
        stmt.bind(Arg::Int(row.position));
        for ((name, _), arg) in self.spec.columns.iter().zip(args) {
            stmt.push(&format!(", {name} = ")).bind(arg);
        }
        stmt.push(&format!(" WHERE {} = ", self.spec.id_column))
            .bind(Arg::Text(Some(row.id.to_string())));

        match self.execute(&stmt, "Failed to update row").await? {
            0 => Err(Self::not_found(&row.id)),
            _ => Ok(()),
        }
    }

    async fn delete(&mut self, id: &ItemId) -> Result<()> {
        let mut stmt = Statement::new(format!(
            "DELETE FROM {} WHERE {} = ",
            self.spec.table, self.spec.id_column
        ));
        stmt.bind(Arg::Text(Some(id.to_string())));

        match self.execute(&stmt, "Failed to delete row").await? {
            0 => Err(Self::not_found(id)),
            _ => Ok(()),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .sql_context("Failed to commit transaction")
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .sql_context("Failed to roll back transaction")
    }
}
