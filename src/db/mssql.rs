//! SQL Server adapter over a single `tiberius` session.
//!
//! Callers write `?`; statements are rewritten to `@p0, @p1, ...` and the
//! values are registered under those names through `sp_executesql`.

use crate::db::adapter::{DatabaseAdapter, validate_table_name};
use crate::db::lifecycle::AdapterHandle;
use crate::db::placeholder::{BoundParam, PlaceholderStyle, TranslatedQuery, translate};
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnInfo, ConnectionTarget, DatabaseType, Row, RowSet, SqlValue, TableInfo, WriteResult,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Query};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

const DIALECT: DatabaseType = DatabaseType::SqlServer;

type TdsClient = Client<Compat<TcpStream>>;

mod queries {
    pub const PING: &str = "SELECT 1";

    pub const LIST_TABLES: &str = r#"
        SELECT TABLE_NAME
        FROM INFORMATION_SCHEMA.TABLES
        WHERE TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
        "#;

    pub const DESCRIBE_TABLE: &str = r#"
        SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, COLUMN_DEFAULT
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_NAME = @P1
        ORDER BY ORDINAL_POSITION
        "#;
}

pub struct SqlServerAdapter {
    target: ConnectionTarget,
    handle: AdapterHandle<Arc<Mutex<TdsClient>>>,
}

impl std::fmt::Debug for SqlServerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerAdapter")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl SqlServerAdapter {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            handle: AdapterHandle::new(DIALECT),
        }
    }

    /// Build the client configuration from the URL.
    ///
    /// Recognised query options: `trustServerCertificate`, `encrypt`.
    fn config(&self) -> Config {
        let mut config = Config::new();
        config.host(self.target.host().unwrap_or("localhost"));
        config.port(self.target.port_or_default().unwrap_or(1433));
        config.application_name("multi-db-mcp");
        if let Some(database) = self.target.database() {
            config.database(database);
        }
        config.authentication(AuthMethod::sql_server(
            self.target.username().unwrap_or_default(),
            self.target.password().unwrap_or_default(),
        ));
        if self.target.flag("trustServerCertificate") {
            config.trust_cert();
        }
        if matches!(self.target.option("encrypt"), Some(v) if v.eq_ignore_ascii_case("false")) {
            config.encryption(EncryptionLevel::Off);
        }
        config
    }

    async fn open_client(&self) -> DbResult<TdsClient> {
        let config = self.config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| DbError::connect_failed(DIALECT, e))?;
        tcp.set_nodelay(true)
            .map_err(|e| DbError::connect_failed(DIALECT, e))?;

        let mut client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| DbError::connect_failed(DIALECT, e))?;

        client
            .simple_query(queries::PING)
            .await
            .map_err(|e| DbError::connect_failed(DIALECT, e))?
            .into_results()
            .await
            .map_err(|e| DbError::connect_failed(DIALECT, e))?;
        Ok(client)
    }
}

impl DatabaseAdapter for SqlServerAdapter {
    fn db_type(&self) -> DatabaseType {
        DIALECT
    }

    async fn connect(&self) -> DbResult<()> {
        if self.handle.is_connected().await {
            return Ok(());
        }
        info!(dialect = %DIALECT, target = %self.target.masked(), "Connecting to database");

        let client = self.open_client().await.inspect_err(|e| {
            warn!(dialect = %DIALECT, error = %e, "Connection failed");
        })?;
        if let Some(previous) = self.handle.install(Arc::new(Mutex::new(client))).await {
            close_client(previous).await;
        }

        info!(dialect = %DIALECT, "Connected successfully");
        Ok(())
    }

    async fn close(&self) {
        if let Some(client) = self.handle.take().await {
            close_client(client).await;
            info!(dialect = %DIALECT, "Connection closed");
        }
    }

    async fn is_connected(&self) -> bool {
        self.handle.is_connected().await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<RowSet> {
        let client = self.handle.get().await?;
        let mut client = client.lock().await;

        let translated = translate(sql, params, PlaceholderStyle::Named);
        let rows = if translated.params.is_empty() {
            client
                .simple_query(translated.sql.as_str())
                .await
                .map_err(DbError::from_tiberius)?
                .into_first_result()
                .await
        } else {
            named_query(&translated)
                .query(&mut *client)
                .await
                .map_err(DbError::from_tiberius)?
                .into_first_result()
                .await
        }
        .map_err(DbError::from_tiberius)?;

        debug!(dialect = %DIALECT, rows = rows.len(), "Query complete");
        Ok(rows.iter().map(to_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<WriteResult> {
        let client = self.handle.get().await?;
        let mut client = client.lock().await;

        let translated = translate(sql, params, PlaceholderStyle::Named);
        let result = if translated.params.is_empty() {
            client.execute(translated.sql.as_str(), &[]).await
        } else {
            named_query(&translated).execute(&mut *client).await
        }
        .map_err(DbError::from_tiberius)?;

        // One count per statement in the batch
        Ok(WriteResult::new(result.rows_affected().iter().sum()))
    }

    async fn list_tables(&self) -> DbResult<Vec<String>> {
        let client = self.handle.get().await?;
        let mut client = client.lock().await;

        let rows = client
            .simple_query(queries::LIST_TABLES)
            .await
            .map_err(DbError::from_tiberius)?
            .into_first_result()
            .await
            .map_err(DbError::from_tiberius)?;

        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<&str, _>("TABLE_NAME").ok().flatten())
            .map(str::to_string)
            .collect())
    }

    async fn describe_table(&self, name: &str) -> DbResult<TableInfo> {
        validate_table_name(name)?;
        let client = self.handle.get().await?;
        let mut client = client.lock().await;

        let mut query = Query::new(queries::DESCRIBE_TABLE);
        query.bind(name);
        let rows = query
            .query(&mut *client)
            .await
            .map_err(DbError::from_tiberius)?
            .into_first_result()
            .await
            .map_err(DbError::from_tiberius)?;

        let columns = rows
            .iter()
            .map(|row| {
                let text = |col: &str| row.try_get::<&str, _>(col).ok().flatten();
                ColumnInfo::new(
                    text("COLUMN_NAME").unwrap_or_default(),
                    text("DATA_TYPE").unwrap_or_default(),
                    text("IS_NULLABLE") == Some("YES"),
                )
                .with_default(text("COLUMN_DEFAULT"))
            })
            .collect::<Vec<_>>();

        if columns.is_empty() {
            return Err(DbError::table_not_found(name));
        }
        Ok(TableInfo::new(name, columns))
    }

    /// SQL Server exposes no `CREATE TABLE` source for tables.
    async fn get_table_ddl(&self, _name: &str) -> DbResult<Option<String>> {
        Ok(None)
    }
}

async fn close_client(client: Arc<Mutex<TdsClient>>) {
    // The last reference owns the session; closing an in-use clone is left to drop
    match Arc::try_unwrap(client) {
        Ok(client) => {
            if let Err(e) = client.into_inner().close().await {
                debug!(dialect = %DIALECT, error = %e, "Error while closing session");
            }
        }
        Err(_) => debug!(dialect = %DIALECT, "Session still in use, dropping handle"),
    }
}

/// Wrap a translated statement so each value is registered under its own name.
///
/// The outer batch is `EXEC sp_executesql @P1, @P2, @p0 = @P3, ...` where `@P1`
/// is the statement and `@P2` declares `@p0, @p1, ...`.
fn named_query(translated: &TranslatedQuery) -> Query<'static> {
    let mut declarations = Vec::with_capacity(translated.params.len());
    let mut assignments = Vec::with_capacity(translated.params.len());
    for (idx, param) in translated.params.iter().enumerate() {
        let name = param_name(param, idx);
        declarations.push(format!("@{name} {}", declared_type(&param.value)));
        assignments.push(format!("@{name} = @P{}", idx + 3));
    }

    let mut query = Query::new(format!(
        "EXEC sp_executesql @P1, @P2, {}",
        assignments.join(", ")
    ));
    query.bind(translated.sql.clone());
    query.bind(declarations.join(", "));
    for param in &translated.params {
        bind_value(&mut query, &param.value);
    }
    query
}

fn param_name(param: &BoundParam, idx: usize) -> String {
    param.name.clone().unwrap_or_else(|| format!("p{idx}"))
}

fn declared_type(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Bool(_) => "bit",
        SqlValue::Int(_) => "bigint",
        SqlValue::Float(_) => "float",
        SqlValue::Bytes(_) => "varbinary(max)",
        SqlValue::Null | SqlValue::Text(_) => "nvarchar(max)",
    }
}

fn bind_value(query: &mut Query<'static>, value: &SqlValue) {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
    }
}

fn to_row(row: &tiberius::Row) -> Row {
    let mut out = Row::with_capacity(row.len());
    for (column, data) in row.cells() {
        out.push(column.name(), decode_cell(data));
    }
    out
}

fn decode_cell(data: &ColumnData<'static>) -> SqlValue {
    match data {
        ColumnData::U8(v) => v.map(|v| SqlValue::Int(v.into())).unwrap_or(SqlValue::Null),
        ColumnData::I16(v) => v.map(|v| SqlValue::Int(v.into())).unwrap_or(SqlValue::Null),
        ColumnData::I32(v) => v.map(|v| SqlValue::Int(v.into())).unwrap_or(SqlValue::Null),
        ColumnData::I64(v) => v.map(SqlValue::Int).unwrap_or(SqlValue::Null),
        ColumnData::F32(v) => v
            .map(|v| SqlValue::Float(v.into()))
            .unwrap_or(SqlValue::Null),
        ColumnData::F64(v) => v.map(SqlValue::Float).unwrap_or(SqlValue::Null),
        ColumnData::Bit(v) => v.map(SqlValue::Bool).unwrap_or(SqlValue::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| SqlValue::Text(s.to_string()))
            .unwrap_or(SqlValue::Null),
        ColumnData::Guid(v) => v
            .as_ref()
            .map(|g| SqlValue::Text(g.to_string()))
            .unwrap_or(SqlValue::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| SqlValue::Bytes(b.to_vec()))
            .unwrap_or(SqlValue::Null),
        // DECIMAL keeps its exact digits
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| SqlValue::Text(n.to_string()))
            .unwrap_or(SqlValue::Null),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| SqlValue::Text(x.clone().into_owned().into_string()))
            .unwrap_or(SqlValue::Null),
        temporal => decode_temporal(temporal),
    }
}

fn decode_temporal(data: &ColumnData<'static>) -> SqlValue {
    if let Ok(Some(v)) = NaiveDateTime::from_sql(data) {
        return SqlValue::Text(v.to_string());
    }
    if let Ok(Some(v)) = DateTime::<FixedOffset>::from_sql(data) {
        return SqlValue::Text(v.to_rfc3339());
    }
    if let Ok(Some(v)) = NaiveDate::from_sql(data) {
        return SqlValue::Text(v.to_string());
    }
    if let Ok(Some(v)) = NaiveTime::from_sql(data) {
        return SqlValue::Text(v.to_string());
    }
    SqlValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn adapter(url: &str) -> SqlServerAdapter {
        SqlServerAdapter::new(ConnectionTarget::parse(url).unwrap())
    }

    #[test]
    fn test_config_reads_url() {
        let adapter = adapter("mssql://sa:pw@db.internal:14330/sales?trustServerCertificate=true");
        let config = adapter.config();
        assert_eq!(config.get_addr(), "db.internal:14330");
    }

    #[test]
    fn test_config_default_port() {
        let adapter = adapter("sqlserver://sa:pw@db.internal/sales");
        assert_eq!(adapter.config().get_addr(), "db.internal:1433");
    }

    #[test]
    fn test_declared_types() {
        assert_eq!(declared_type(&SqlValue::Bool(true)), "bit");
        assert_eq!(declared_type(&SqlValue::Int(1)), "bigint");
        assert_eq!(declared_type(&SqlValue::Float(1.0)), "float");
        assert_eq!(declared_type(&SqlValue::Text("a".into())), "nvarchar(max)");
        assert_eq!(declared_type(&SqlValue::Null), "nvarchar(max)");
        assert_eq!(declared_type(&SqlValue::Bytes(vec![1])), "varbinary(max)");
    }

    #[test]
    fn test_decode_cells() {
        assert_eq!(decode_cell(&ColumnData::I32(Some(5))), SqlValue::Int(5));
        assert_eq!(decode_cell(&ColumnData::I32(None)), SqlValue::Null);
        assert_eq!(decode_cell(&ColumnData::Bit(Some(true))), SqlValue::Bool(true));
        assert_eq!(
            decode_cell(&ColumnData::String(Some(Cow::Borrowed("x")))),
            SqlValue::Text("x".into())
        );
        assert_eq!(
            decode_cell(&ColumnData::Binary(Some(Cow::Owned(vec![1, 2])))),
            SqlValue::Bytes(vec![1, 2])
        );
    }

    #[tokio::test]
    async fn test_ddl_is_always_unavailable() {
        let adapter = adapter("mssql://sa:pw@localhost/app");
        assert_eq!(adapter.get_table_ddl("orders").await.unwrap(), None);
        assert_eq!(adapter.get_table_ddl("x; DROP").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let adapter = adapter("mssql://sa:pw@localhost/app");
        assert!(matches!(
            adapter.query("SELECT ?", &[SqlValue::Int(1)]).await,
            Err(DbError::NotConnected { .. })
        ));
        adapter.close().await;
        adapter.close().await;
    }
}
