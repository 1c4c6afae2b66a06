//! SQL table creation.
//!
//! The store works on a host table described by a [`TableSpec`]. When the table does not
//! exist yet it is created with portable column types that SQLite and PostgreSQL decode
//! the same way:
//!
//! - the id column is `TEXT PRIMARY KEY`
//! - the position column is a nullable `BIGINT` (null = not in list)
//! - attribute columns use [`ValueKind::sql_type`](crate::item::ValueKind::sql_type)
//!
//! An existing table is used as is; only the position index is added if missing.

use super::{SqlxResultExt, SqlxStore, TableSpec};
use crate::Result;

/// The `CREATE TABLE IF NOT EXISTS` statement for a table layout.
pub fn create_table(spec: &TableSpec) -> String {
    let mut columns = vec![
        format!("{} TEXT PRIMARY KEY NOT NULL", spec.id_column),
        format!("{} BIGINT", spec.position_column),
    ];
    columns.extend(
        spec.columns
            .iter()
            .map(|(name, kind)| format!("{name} {}", kind.sql_type())),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        spec.table,
        columns.join(",\n    ")
    )
}

/// The `CREATE INDEX IF NOT EXISTS` statement for the position column.
pub fn create_position_index(spec: &TableSpec) -> String {
    let index = format!("idx_{}_{}", spec.table, spec.position_column).replace('.', "_");
    format!(
        "CREATE INDEX IF NOT EXISTS {index} ON {}({})",
        spec.table, spec.position_column
    )
}

/// Initialize the table and its position index.
pub async fn initialize(store: &SqlxStore) -> Result<()> {
    let spec = store.spec();

    for statement in [create_table(spec), create_position_index(spec)] {
        sqlx::query(&statement)
            .execute(store.pool())
            .await
            .sql_context(&format!("Schema creation failed - SQL: {statement}"))?;
    }

    tracing::info!(
        table = %spec.table,
        position_column = %spec.position_column,
        kind = ?store.kind(),
        "Initialized list table"
    );
    Ok(())
}
