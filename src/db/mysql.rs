//! MySQL adapter over a bounded `sqlx` pool.

use crate::db::adapter::{AdapterOptions, DatabaseAdapter, validate_table_name};
use crate::db::lifecycle::AdapterHandle;
use crate::db::params::bind_mysql_param;
use crate::db::types::to_row_set;
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnInfo, ConnectionTarget, DatabaseType, RowSet, SqlValue, TableInfo, WriteResult,
};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::{MySqlPool, Row as _};
use std::str::FromStr;
use tracing::{debug, info, warn};

const DIALECT: DatabaseType = DatabaseType::MySQL;

mod queries {
    pub const PING: &str = "SELECT 1";
    pub const LIST_TABLES: &str = "SHOW TABLES";

    pub fn describe(table: &str) -> String {
        format!("DESCRIBE `{table}`")
    }

    pub fn show_create(table: &str) -> String {
        format!("SHOW CREATE TABLE `{table}`")
    }
}

#[derive(Debug)]
pub struct MySqlAdapter {
    target: ConnectionTarget,
    options: AdapterOptions,
    handle: AdapterHandle<MySqlPool>,
}

impl MySqlAdapter {
    pub fn new(target: ConnectionTarget, options: AdapterOptions) -> Self {
        Self {
            target,
            options,
            handle: AdapterHandle::new(DIALECT),
        }
    }

    async fn open_pool(&self) -> DbResult<MySqlPool> {
        let options = MySqlConnectOptions::from_str(self.target.url())
            .map_err(|e| DbError::connect_failed(DIALECT, e))?
            .charset("utf8mb4");

        let pool = MySqlPoolOptions::new()
            .max_connections(self.options.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| DbError::connect_failed(DIALECT, e))?;

        // Acquire a real connection before reporting success
        if let Err(e) = sqlx::query(queries::PING).execute(&pool).await {
            pool.close().await;
            return Err(DbError::connect_failed(DIALECT, e));
        }
        Ok(pool)
    }
}

impl DatabaseAdapter for MySqlAdapter {
    fn db_type(&self) -> DatabaseType {
        DIALECT
    }

    async fn connect(&self) -> DbResult<()> {
        if self.handle.is_connected().await {
            return Ok(());
        }
        info!(dialect = %DIALECT, target = %self.target.masked(), "Connecting to database");

        let pool = self.open_pool().await.inspect_err(|e| {
            warn!(dialect = %DIALECT, error = %e, "Connection failed");
        })?;
        if let Some(previous) = self.handle.install(pool).await {
            previous.close().await;
        }

        info!(
            dialect = %DIALECT,
            max_connections = self.options.max_connections,
            "Connected successfully"
        );
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
        execute_write(&pool, sql, params).await
    }

    async fn list_tables(&self) -> DbResult<Vec<String>> {
        let pool = self.handle.get().await?;
        let rows = fetch_rows(&pool, queries::LIST_TABLES, &[]).await?;
        // SHOW TABLES has a single column named after the database
        Ok(rows
            .iter()
            .filter_map(|row| get_string_by_index(row, 0))
            .collect())
    }

    async fn describe_table(&self, name: &str) -> DbResult<TableInfo> {
        validate_table_name(name)?;
        let pool = self.handle.get().await?;
        let rows = fetch_rows(&pool, &queries::describe(name), &[]).await?;

        let columns = rows
            .iter()
            .map(|row| {
                ColumnInfo::new(
                    get_string(row, "Field"),
                    get_string(row, "Type"),
                    get_string(row, "Null").eq_ignore_ascii_case("YES"),
                )
                .with_key(get_optional_string(row, "Key"))
                .with_default(get_optional_string(row, "Default"))
                .with_extra(get_optional_string(row, "Extra"))
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
        match fetch_rows(&pool, &queries::show_create(name), &[]).await {
            // Columns are "Table" and "Create Table"
            Ok(rows) => Ok(rows.first().and_then(|row| get_string_by_index(row, 1))),
            Err(e) => {
                debug!(dialect = %DIALECT, table = name, error = %e, "DDL unavailable");
                Ok(None)
            }
        }
    }
}

async fn fetch_rows(pool: &MySqlPool, sql: &str, params: &[SqlValue]) -> DbResult<Vec<MySqlRow>> {
    // When params is empty, use raw SQL to avoid prepared statement issues
    let result = if params.is_empty() {
        use sqlx::Executor;
        pool.fetch_all(sql).await
    } else {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_mysql_param(query, param);
        }
        query.fetch_all(pool).await
    };
    result.map_err(|e| DbError::from_sqlx(DIALECT, e))
}

async fn execute_write(pool: &MySqlPool, sql: &str, params: &[SqlValue]) -> DbResult<WriteResult> {
    // Some statements (CREATE PROCEDURE, ...) cannot be prepared
    let result = if params.is_empty() {
        use sqlx::Executor;
        pool.execute(sql).await
    } else {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_mysql_param(query, param);
        }
        query.execute(pool).await
    }
    .map_err(|e| DbError::from_sqlx(DIALECT, e))?;

    let write = WriteResult::new(result.rows_affected());
    // LAST_INSERT_ID is 0 when the statement generated no id
    match i64::try_from(result.last_insert_id()) {
        Ok(id) if id > 0 => Ok(write.with_last_insert_id(id)),
        _ => Ok(write),
    }
}

/// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
fn get_string(row: &MySqlRow, column: &str) -> String {
    get_optional_string(row, column).unwrap_or_default()
}

fn get_optional_string(row: &MySqlRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .or_else(|| {
            row.try_get::<Option<Vec<u8>>, _>(column)
                .ok()
                .flatten()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
}

fn get_string_by_index(row: &MySqlRow, index: usize) -> Option<String> {
    row.try_get::<String, _>(index).ok().or_else(|| {
        row.try_get::<Vec<u8>, _>(index)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    })
}
