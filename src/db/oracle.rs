//! Oracle adapter over a single blocking OCI session.
//!
//! The `oracle` client is synchronous, so every call runs on the blocking pool
//! with the session behind a mutex. Placeholders are rewritten to `:0, :1, ...`
//! and writes are committed in the same call.

use crate::db::adapter::{DatabaseAdapter, validate_table_name};
use crate::db::fallback::first_non_empty;
use crate::db::lifecycle::AdapterHandle;
use crate::db::placeholder::{PlaceholderStyle, translate};
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnInfo, ConnectionTarget, DatabaseType, Row, RowSet, SqlValue, TableInfo, WriteResult,
};
use oracle::Connection;
use oracle::sql_type::{OracleType, ToSql};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const DIALECT: DatabaseType = DatabaseType::Oracle;

mod queries {
    pub const LIST_TABLES: &str = "SELECT table_name FROM user_tables ORDER BY table_name";

    pub const DESCRIBE_TABLE: &str = r#"
        SELECT column_name, data_type, nullable, data_default
        FROM user_tab_columns
        WHERE table_name = :0
        ORDER BY column_id
        "#;

    pub const TABLE_DDL: &str = "SELECT DBMS_METADATA.GET_DDL('TABLE', :0) AS DDL FROM DUAL";
}

type Session = Arc<Mutex<Connection>>;

pub struct OracleAdapter {
    target: ConnectionTarget,
    handle: AdapterHandle<Session>,
}

impl std::fmt::Debug for OracleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleAdapter")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl OracleAdapter {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            handle: AdapterHandle::new(DIALECT),
        }
    }

    /// `host:port/service`, the easy-connect form the client accepts.
    pub fn connect_string(&self) -> String {
        format!(
            "{}:{}/{}",
            self.target.host().unwrap_or("localhost"),
            self.target.port_or_default().unwrap_or(1521),
            self.target.database().unwrap_or_default()
        )
    }

    /// Run `f` against the live session on the blocking pool.
    async fn with_session<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let session = self.handle.get().await?;
        run_blocking(move || {
            let conn = session
                .lock()
                .map_err(|_| DbError::internal("Oracle session lock poisoned"))?;
            f(&conn)
        })
        .await
    }
}

impl DatabaseAdapter for OracleAdapter {
    fn db_type(&self) -> DatabaseType {
        DIALECT
    }

    async fn connect(&self) -> DbResult<()> {
        if self.handle.is_connected().await {
            return Ok(());
        }
        info!(dialect = %DIALECT, target = %self.target.masked(), "Connecting to database");

        let username = self.target.username().unwrap_or_default().to_string();
        let password = self.target.password().unwrap_or_default().to_string();
        let connect_string = self.connect_string();

        let conn = run_blocking(move || {
            let conn = Connection::connect(username, password, connect_string)
                .map_err(|e| DbError::connect_failed(DIALECT, e))?;
            conn.ping().map_err(|e| DbError::connect_failed(DIALECT, e))?;
            Ok(conn)
        })
        .await
        .inspect_err(|e| {
            warn!(dialect = %DIALECT, error = %e, "Connection failed");
        })?;

        if let Some(previous) = self.handle.install(Arc::new(Mutex::new(conn))).await {
            close_session(previous).await;
        }

        info!(dialect = %DIALECT, "Connected successfully");
        Ok(())
    }

    async fn close(&self) {
        if let Some(session) = self.handle.take().await {
            close_session(session).await;
            info!(dialect = %DIALECT, "Connection closed");
        }
    }

    async fn is_connected(&self) -> bool {
        self.handle.is_connected().await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<RowSet> {
        let translated = translate(sql, params, PlaceholderStyle::Ordinal);
        let values = translated
            .params
            .into_iter()
            .map(|p| p.value)
            .collect::<Vec<_>>();
        let sql = translated.sql;

        let rows = self
            .with_session(move |conn| fetch_rows(conn, &sql, &values))
            .await?;
        debug!(dialect = %DIALECT, rows = rows.len(), "Query complete");
        Ok(rows)
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<WriteResult> {
        let translated = translate(sql, params, PlaceholderStyle::Ordinal);
        let values = translated
            .params
            .into_iter()
            .map(|p| p.value)
            .collect::<Vec<_>>();
        let sql = translated.sql;

        self.with_session(move |conn| {
            let bound = to_oracle_params(&values);
            let refs = param_refs(&bound);
            let stmt = conn.execute(&sql, &refs).map_err(DbError::from_oracle)?;
            let rows_affected = stmt.row_count().map_err(DbError::from_oracle)?;
            conn.commit().map_err(DbError::from_oracle)?;
            Ok(WriteResult::new(rows_affected))
        })
        .await
    }

    async fn list_tables(&self) -> DbResult<Vec<String>> {
        let rows = self
            .with_session(|conn| fetch_rows(conn, queries::LIST_TABLES, &[]))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.value_at(0).and_then(SqlValue::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn describe_table(&self, name: &str) -> DbResult<TableInfo> {
        describe_with(name, |candidate| {
            let candidate = candidate.clone();
            async move {
                let rows = self
                    .with_session(move |conn| {
                        fetch_rows(conn, queries::DESCRIBE_TABLE, &[SqlValue::Text(candidate)])
                    })
                    .await?;
                Ok(rows.iter().map(column_from_catalog).collect())
            }
        })
        .await
    }

    async fn get_table_ddl(&self, name: &str) -> DbResult<Option<String>> {
        validate_table_name(name)?;
        // Unquoted identifiers are stored upper-case
        let upper = name.to_uppercase();
        let result = self
            .with_session(move |conn| fetch_rows(conn, queries::TABLE_DDL, &[SqlValue::Text(upper)]))
            .await;

        match result {
            Ok(rows) => Ok(rows
                .first()
                .and_then(|row| row.value_at(0))
                .and_then(SqlValue::as_str)
                .map(str::to_string)),
            Err(e) => {
                debug!(dialect = %DIALECT, table = name, error = %e, "DDL unavailable");
                Ok(None)
            }
        }
    }
}

/// Describe `name`, retrying with the upper-cased name when the first lookup
/// finds no columns.
pub(crate) async fn describe_with<F, Fut>(name: &str, fetch: F) -> DbResult<TableInfo>
where
    F: FnMut(&String) -> Fut,
    Fut: Future<Output = DbResult<Vec<ColumnInfo>>>,
{
    validate_table_name(name)?;

    let mut candidates = vec![name.to_string()];
    let upper = name.to_uppercase();
    if upper != name {
        candidates.push(upper);
    }

    let columns = first_non_empty(&candidates, fetch).await?;
    if columns.is_empty() {
        return Err(DbError::table_not_found(name));
    }
    Ok(TableInfo::new(name, columns))
}

fn column_from_catalog(row: &Row) -> ColumnInfo {
    let text = |col: &str| row.get_ignore_case(col).and_then(SqlValue::as_str);
    ColumnInfo::new(
        text("COLUMN_NAME").unwrap_or_default(),
        text("DATA_TYPE").unwrap_or_default(),
        text("NULLABLE") == Some("Y"),
    )
    .with_default(text("DATA_DEFAULT").map(str::trim))
}

async fn run_blocking<T, F>(f: F) -> DbResult<T>
where
    F: FnOnce() -> DbResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DbError::internal(format!("Oracle task failed: {e}")))?
}

async fn close_session(session: Session) {
    let result = run_blocking(move || {
        let conn = session
            .lock()
            .map_err(|_| DbError::internal("Oracle session lock poisoned"))?;
        conn.close().map_err(DbError::from_oracle)
    })
    .await;
    if let Err(e) = result {
        debug!(dialect = %DIALECT, error = %e, "Error while closing session");
    }
}

fn fetch_rows(conn: &Connection, sql: &str, params: &[SqlValue]) -> DbResult<RowSet> {
    let bound = to_oracle_params(params);
    let refs = param_refs(&bound);
    let result_set = conn.query(sql, &refs).map_err(DbError::from_oracle)?;

    let columns = result_set
        .column_info()
        .iter()
        .map(|info| (info.name().to_string(), info.oracle_type().clone()))
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for row in result_set {
        let row = row.map_err(DbError::from_oracle)?;
        let mut out = Row::with_capacity(columns.len());
        for (idx, (name, oracle_type)) in columns.iter().enumerate() {
            out.push(name.as_str(), decode_value(&row, idx, oracle_type));
        }
        rows.push(out);
    }
    Ok(rows)
}

fn decode_value(row: &oracle::Row, idx: usize, oracle_type: &OracleType) -> SqlValue {
    match oracle_type {
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => row
            .get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null),
        OracleType::Number(_, _)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble
        | OracleType::Int64
        | OracleType::UInt64 => row
            .get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(|text| parse_number(&text))
            .unwrap_or(SqlValue::Null),
        _ => row
            .get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null),
    }
}

/// Integral NUMBERs become `Int`, other finite values `Float`.
fn parse_number(text: &str) -> SqlValue {
    if let Ok(v) = text.parse::<i64>() {
        return SqlValue::Int(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => SqlValue::Float(v),
        _ => SqlValue::Text(text.to_string()),
    }
}

fn to_oracle_params(params: &[SqlValue]) -> Vec<Box<dyn ToSql>> {
    params
        .iter()
        .map(|value| -> Box<dyn ToSql> {
            match value {
                SqlValue::Null => Box::new(Option::<String>::None),
                // No boolean bind type before 23c
                SqlValue::Bool(v) => Box::new(i64::from(*v)),
                SqlValue::Int(v) => Box::new(*v),
                SqlValue::Float(v) => Box::new(*v),
                SqlValue::Text(v) => Box::new(v.clone()),
                SqlValue::Bytes(v) => Box::new(v.clone()),
            }
        })
        .collect()
}

fn param_refs(bound: &[Box<dyn ToSql>]) -> Vec<&dyn ToSql> {
    bound.iter().map(|b| b.as_ref()).collect()
}
