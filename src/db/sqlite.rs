//! SQLite adapter over a single-connection `sqlx` pool.
//!
//! One connection keeps in-memory databases and `last_insert_rowid` coherent
//! across calls. The database file is created when missing.

use crate::db::adapter::{DatabaseAdapter, validate_table_name};
use crate::db::lifecycle::AdapterHandle;
use crate::db::params::bind_sqlite_param;
use crate::db::types::to_row_set;
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnInfo, ConnectionTarget, DatabaseType, RowSet, SqlValue, TableInfo, WriteResult,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, SqlitePool};
use tracing::{debug, info, warn};

const DIALECT: DatabaseType = DatabaseType::SQLite;

mod queries {
    pub const PING: &str = "SELECT 1";

    pub const LIST_TABLES: &str =
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'";

    pub const TABLE_DDL: &str = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?";

    pub fn table_info(table: &str) -> String {
        format!("PRAGMA table_info('{table}')")
    }
}

#[derive(Debug)]
pub struct SqliteAdapter {
    target: ConnectionTarget,
    handle: AdapterHandle<SqlitePool>,
}

impl SqliteAdapter {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            handle: AdapterHandle::new(DIALECT),
        }
    }

    /// Filesystem path of the database.
    pub fn path(&self) -> &str {
        self.target.file_path().unwrap_or_default()
    }

    async fn open_pool(&self) -> DbResult<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(self.path())
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DbError::connect_failed(DIALECT, e))?;

        if let Err(e) = sqlx::query(queries::PING).execute(&pool).await {
            pool.close().await;
            return Err(DbError::connect_failed(DIALECT, e));
        }
        Ok(pool)
    }
}

impl DatabaseAdapter for SqliteAdapter {
    fn db_type(&self) -> DatabaseType {
        DIALECT
    }

    async fn connect(&self) -> DbResult<()> {
        if self.handle.is_connected().await {
            return Ok(());
        }
        info!(dialect = %DIALECT, path = %self.path(), "Opening database");

        let pool = self.open_pool().await.inspect_err(|e| {
            warn!(dialect = %DIALECT, error = %e, "Connection failed");
        })?;
        if let Some(previous) = self.handle.install(pool).await {
            previous.close().await;
        }

        info!(dialect = %DIALECT, "Connected successfully");
        Ok(())
    }

    async fn close(&self) {
        if let Some(pool) = self.handle.take().await {
            pool.close().await;
            info!(dialect = %DIALECT, "Connection closed");
        }
    }

    async fn is_connected(&self) -> bool {
        self.handle.is_connected().await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<RowSet> {
        let pool = self.handle.get().await?;
        let rows = fetch_rows(&pool, sql, params).await?;
        debug!(dialect = %DIALECT, rows = rows.len(), "Query complete");
        Ok(to_row_set(&rows))
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<WriteResult> {
        let pool = self.handle.get().await?;
        let result = if params.is_empty() {
            use sqlx::Executor;
            pool.execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.execute(&pool).await
        }
        .map_err(|e| DbError::from_sqlx(DIALECT, e))?;

        Ok(WriteResult::new(result.rows_affected()).with_last_insert_id(result.last_insert_rowid()))
    }

    async fn list_tables(&self) -> DbResult<Vec<String>> {
        let pool = self.handle.get().await?;
        let rows = fetch_rows(&pool, queries::LIST_TABLES, &[]).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("name").ok())
            .collect())
    }

    async fn describe_table(&self, name: &str) -> DbResult<TableInfo> {
        validate_table_name(name)?;
        let pool = self.handle.get().await?;
        let rows = fetch_rows(&pool, &queries::table_info(name), &[]).await?;

        let columns = rows
            .iter()
            .map(|row| {
                let not_null: i64 = row.try_get("notnull").unwrap_or(0);
                let pk: i64 = row.try_get("pk").unwrap_or(0);
                ColumnInfo::new(
                    row.try_get::<String, _>("name").unwrap_or_default(),
                    row.try_get::<String, _>("type").unwrap_or_default(),
                    not_null == 0,
                )
                .with_key((pk > 0).then_some("PRI"))
                .with_default(row.try_get::<Option<String>, _>("dflt_value").ok().flatten())
            })
            .collect::<Vec<_>>();

        if columns.is_empty() {
            return Err(DbError::table_not_found(name));
        }
        Ok(TableInfo::new(name, columns))
    }

    async fn get_table_ddl(&self, name: &str) -> DbResult<Option<String>> {
        validate_table_name(name)?;
        let pool = match self.handle.get().await {
            Ok(pool) => pool,
            Err(_) => return Ok(None),
        };
        let params = [SqlValue::from(name)];
        match fetch_rows(&pool, queries::TABLE_DDL, &params).await {
            Ok(rows) => Ok(rows
                .first()
                .and_then(|row| row.try_get::<Option<String>, _>("sql").ok().flatten())),
            Err(e) => {
                debug!(dialect = %DIALECT, table = name, error = %e, "DDL unavailable");
                Ok(None)
            }
        }
    }
}

async fn fetch_rows(pool: &SqlitePool, sql: &str, params: &[SqlValue]) -> DbResult<Vec<SqliteRow>> {
    let result = if params.is_empty() {
        use sqlx::Executor;
        pool.fetch_all(sql).await
    } else {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        query.fetch_all(pool).await
    };
    result.map_err(|e| DbError::from_sqlx(DIALECT, e))
}
