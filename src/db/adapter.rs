//! The capability contract every database dialect implements.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, RowSet, SqlValue, TableInfo, WriteResult};
use std::future::Future;

/// Uniform surface over one database connection.
///
/// Implementations own exactly one connection handle (a pool or a single
/// session). Every operation other than [`connect`](Self::connect) and
/// [`close`](Self::close) fails with [`DbError::NotConnected`] while that handle
/// is absent.
///
/// Placeholders: MySQL, SQLite, SQL Server and Oracle accept `?` and translate
/// internally. PostgreSQL passes SQL through untouched, so callers must write
/// `$1, $2, ...` for that dialect.
pub trait DatabaseAdapter: Send + Sync {
    /// Dialect served by this adapter.
    fn db_type(&self) -> DatabaseType;

    /// Establish the handle and verify it with a liveness check.
    ///
    /// A no-op when already connected.
    fn connect(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Release the handle. Idempotent and infallible.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Whether a live handle is currently installed.
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    /// Run a statement and return its rows.
    fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = DbResult<RowSet>> + Send;

    /// Run a write statement. Commits before returning on dialects without autocommit.
    fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = DbResult<WriteResult>> + Send;

    /// Names of the tables visible to the current credential or schema.
    fn list_tables(&self) -> impl Future<Output = DbResult<Vec<String>>> + Send;

    /// Column metadata for one table.
    fn describe_table(&self, name: &str) -> impl Future<Output = DbResult<TableInfo>> + Send;

    /// Native `CREATE TABLE` text, or `None` where the dialect has no direct source.
    ///
    /// Lookup failures are reported as `None`; only an invalid name is an error.
    fn get_table_ddl(&self, name: &str)
    -> impl Future<Output = DbResult<Option<String>>> + Send;
}

/// Default upper bound for pooled dialects.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Construction-time settings shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Pool bound for MySQL and PostgreSQL. SQLite, SQL Server and Oracle
    /// always hold a single session.
    pub max_connections: u32,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl AdapterOptions {
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }
}

/// Reject identifiers outside `[A-Za-z0-9_]+`.
///
/// Table names are interpolated into catalog and sampling queries, so this check
/// runs before any SQL is built.
pub fn validate_table_name(name: &str) -> DbResult<()> {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Ok(())
    } else {
        Err(DbError::invalid_name(name))
    }
}
