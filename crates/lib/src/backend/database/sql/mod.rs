//! SQL-based position store for ranklist.
//!
//! This module provides a position store that keeps rows in a relational table and
//! executes every directive as SQL inside a database transaction.
//!
//! ## Available Databases
//!
//! - **SQLite** (feature: `sqlite`): Embedded database
//! - **PostgreSQL** (feature: `postgres`): PostgreSQL database
//!
//! ## Architecture
//!
//! The SQL store uses sqlx with `AnyPool` for multi-database support. The table it works
//! on is described by a [`TableSpec`]; scope predicates are inlined into the `WHERE`
//! clause in their canonical form, while positions and ids are bound as parameters.
//!
//! ## Schema
//!
//! The table and its position index are created by [`schema::initialize`] when
//! connecting, if they do not exist yet.

mod query;
mod storage;

/// Table creation.
pub mod schema;

use std::any::Any;
#[cfg(feature = "postgres")]
use std::time::Duration;

use async_trait::async_trait;
use sqlx::AnyPool;
#[cfg(feature = "postgres")]
use sqlx::Executor;
use sqlx::any::AnyPoolOptions;

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{PositionStore, PositionTransaction};
use crate::config::ListConfig;
use crate::constants::{DEFAULT_ID_COLUMN, DEFAULT_POSITION_COLUMN};
use crate::item::ValueKind;
use crate::scope::is_identifier;

/// Extension trait for sqlx Result types to simplify error handling.
///
/// Similar to `anyhow::Context`, this trait adds a method to convert
/// sqlx errors to `BackendError::SqlxError` with a context message.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to BackendError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            BackendError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// Database kind for SQL dialect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    /// SQLite database
    Sqlite,
    /// PostgreSQL database
    Postgres,
}

/// Layout of the table holding the orderable rows.
///
/// The id column is `TEXT`, the position column a nullable `BIGINT`, and every attribute
/// column takes the SQL type of its [`ValueKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub table: String,
    pub id_column: String,
    pub position_column: String,
    /// Attribute columns, in table order
    pub columns: Vec<(String, ValueKind)>,
}

impl TableSpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            position_column: DEFAULT_POSITION_COLUMN.to_string(),
            columns: Vec::new(),
        }
    }

    /// A table whose position column is the one named by the list configuration.
    pub fn for_list(table: impl Into<String>, config: &ListConfig) -> Self {
        Self::new(table).with_position_column(config.position_column.clone())
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_position_column(mut self, column: impl Into<String>) -> Self {
        self.position_column = column.into();
        self
    }

    pub fn with_column(mut self, column: impl Into<String>, kind: ValueKind) -> Self {
        self.columns.push((column.into(), kind));
        self
    }

    /// The declared kind of an attribute column.
    pub fn column_kind(&self, column: &str) -> Option<ValueKind> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, kind)| *kind)
    }

    /// Checks that every name is a plain identifier and that no column is declared twice.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> crate::Error { BackendError::InvalidTable { reason }.into() };

        let names = [&self.table, &self.id_column, &self.position_column]
            .into_iter()
            .chain(self.columns.iter().map(|(name, _)| name));
        for name in names {
            if !is_identifier(name) {
                return Err(invalid(format!("'{name}' is not a plain SQL identifier")));
            }
        }

        let mut seen = vec![self.id_column.as_str(), self.position_column.as_str()];
        if self.id_column == self.position_column {
            return Err(invalid(format!(
                "id and position both use column '{}'",
                self.id_column
            )));
        }
        for (name, _) in &self.columns {
            if seen.contains(&name.as_str()) {
                return Err(invalid(format!("column '{name}' is declared twice")));
            }
            seen.push(name);
        }
        Ok(())
    }
}

/// SQL-based position store using sqlx.
///
/// This store supports both SQLite and PostgreSQL through sqlx's `AnyPool`.
///
/// # Thread Safety
///
/// `SqlxStore` is `Send + Sync` as required by `PositionStore`. The underlying
/// sqlx pool handles connection pooling and thread safety.
///
/// # Test Isolation
///
/// For PostgreSQL, each store instance can use its own schema for test isolation.
/// Use `connect_postgres_isolated()` to create an isolated store for testing.
pub struct SqlxStore {
    pool: AnyPool,
    kind: DbKind,
    spec: TableSpec,
}

impl SqlxStore {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Get the database kind.
    pub fn kind(&self) -> DbKind {
        self.kind
    }

    /// Get the table layout.
    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    /// Check if this store is using SQLite.
    pub fn is_sqlite(&self) -> bool {
        self.kind == DbKind::Sqlite
    }

    /// Check if this store is using PostgreSQL.
    pub fn is_postgres(&self) -> bool {
        self.kind == DbKind::Postgres
    }

    async fn with_pool(pool: AnyPool, kind: DbKind, spec: TableSpec) -> Result<Self> {
        let store = Self { pool, kind, spec };
        schema::initialize(&store).await?;
        Ok(store)
    }
}

// SQLite-specific implementations
#[cfg(feature = "sqlite")]
impl SqlxStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the database file and the table if they don't exist.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use ranklist::ValueKind;
    /// use ranklist::backend::database::{SqlxStore, TableSpec};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let spec = TableSpec::new("todo_items").with_column("todo_list_id", ValueKind::Int);
    ///     let store = SqlxStore::open_sqlite("todos.db", spec).await.unwrap();
    /// }
    /// ```
    pub async fn open_sqlite<P: AsRef<std::path::Path>>(path: P, spec: TableSpec) -> Result<Self> {
        // mode=rwc: read-write-create (create file if it doesn't exist)
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        Self::connect_sqlite(&url, spec).await
    }

    /// Connect to a SQLite database using a connection URL (e.g. "sqlite:./my.db").
    pub async fn connect_sqlite(url: &str, spec: TableSpec) -> Result<Self> {
        spec.validate()?;

        // Install any driver support
        sqlx::any::install_default_drivers();

        let is_in_memory = url.contains("mode=memory");

        // An in-memory database lives as long as its last connection, so the pool keeps
        // exactly one connection open. A single connection also keeps shared-cache table
        // locks from failing transactions that read while another one writes.
        let pool = if is_in_memory {
            AnyPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        } else {
            AnyPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        };

        if is_in_memory {
            sqlx::query("PRAGMA busy_timeout = 5000;")
                .execute(&pool)
                .await
                .sql_context("Failed to configure SQLite")?;
        } else {
            // File-based SQLite:
            // - journal_mode=WAL: Write-Ahead Logging for better concurrency
            // - synchronous=NORMAL: Balanced durability (safe with WAL)
            // - busy_timeout=5000: Wait up to 5s for locks before failing
            sqlx::query(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
            .execute(&pool)
            .await
            .sql_context("Failed to configure SQLite")?;
        }

        Self::with_pool(pool, DbKind::Sqlite, spec).await
    }

    /// Create an in-memory SQLite database.
    ///
    /// The database exists only for the lifetime of this store instance.
    /// Useful for testing.
    pub async fn sqlite_in_memory(spec: TableSpec) -> Result<Self> {
        // Use a unique name per instance to avoid sharing between tests.
        let unique_id = uuid::Uuid::new_v4();
        let url = format!("sqlite:file:mem_{unique_id}?mode=memory&cache=shared");
        Self::connect_sqlite(&url, spec).await
    }
}

// PostgreSQL-specific implementations
#[cfg(feature = "postgres")]
impl SqlxStore {
    /// Connect to a PostgreSQL database using a connection URL.
    ///
    /// This connects to the default (public) schema. For test isolation,
    /// use `connect_postgres_isolated()` instead.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use ranklist::backend::database::{SqlxStore, TableSpec};
    ///
    /// let store = SqlxStore::connect_postgres("postgres://localhost/app", TableSpec::new("todo_items"))
    ///     .await
    ///     .unwrap();
    /// ```
    pub async fn connect_postgres(url: &str, spec: TableSpec) -> Result<Self> {
        Self::connect_postgres_with_schema(url, None, spec).await
    }

    /// Connect to a PostgreSQL database, optionally inside a dedicated schema.
    ///
    /// When `schema_name` is set the schema is created if needed and every pooled
    /// connection gets it as its `search_path`.
    async fn connect_postgres_with_schema(
        url: &str,
        schema_name: Option<String>,
        spec: TableSpec,
    ) -> Result<Self> {
        spec.validate()?;

        // Install any driver support
        sqlx::any::install_default_drivers();

        if let Some(ref schema) = schema_name {
            let temp_pool = AnyPoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .sql_context("Failed to connect to PostgreSQL")?;

            let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {schema}");
            sqlx::query(&create_schema)
                .execute(&temp_pool)
                .await
                .sql_context(&format!("Failed to create schema {schema}"))?;

            temp_pool.close().await;
        }

        let schema_for_hook = schema_name.clone();
        let mut pool_options = AnyPoolOptions::new();

        if schema_name.is_some() {
            // Test isolation: a small pool that waits instead of failing when many
            // tests run in parallel
            pool_options = pool_options
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(30));
        } else {
            pool_options = pool_options.max_connections(5);
        }

        let pool = pool_options
            .after_connect(move |conn, _meta| {
                let schema = schema_for_hook.clone();
                Box::pin(async move {
                    if let Some(ref s) = schema {
                        let set_path = format!("SET search_path TO {s}");
                        conn.execute(set_path.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await
            .sql_context("Failed to connect to PostgreSQL")?;

        Self::with_pool(pool, DbKind::Postgres, spec).await
    }

    /// Connect to a PostgreSQL database with test isolation.
    ///
    /// Creates a unique schema for this store instance, ensuring tests
    /// don't interfere with each other when run in parallel.
    pub async fn connect_postgres_isolated(url: &str, spec: TableSpec) -> Result<Self> {
        // PostgreSQL schema names must start with a letter and be lowercase
        let unique_id = uuid::Uuid::new_v4().simple().to_string();
        let schema_name = format!("test_{unique_id}");
        Self::connect_postgres_with_schema(url, Some(schema_name), spec).await
    }
}

#[async_trait]
impl PositionStore for SqlxStore {
    async fn begin(&self) -> Result<Box<dyn PositionTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .sql_context("Failed to begin transaction")?;
        Ok(Box::new(storage::SqlxTransaction::new(tx, self.spec.clone())))
    }

    fn position_column(&self) -> Option<&str> {
        Some(&self.spec.position_column)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(feature = "sqlite")]
/// Convenience type alias for the SQLite store.
pub type Sqlite = SqlxStore;

#[cfg(feature = "postgres")]
/// Convenience type alias for the PostgreSQL store.
pub type Postgres = SqlxStore;
