//! Audited facade over the process's single adapter.
//!
//! Every operation is timed and recorded to the injected [`AuditSink`] before
//! its result is handed back, whether it succeeded or not.

use crate::audit::{AuditEntry, AuditSink, SYSTEM_TOOL};
use crate::db::{Adapter, DatabaseAdapter, inspect_table};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, RowSet, SqlValue, TableInfo, WriteResult};
use crate::tools::sql_validator::validate_readonly;
use serde_json::{Value as JsonValue, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct Gateway<A = Adapter> {
    adapter: A,
    sink: Arc<dyn AuditSink>,
}

impl<A: std::fmt::Debug> std::fmt::Debug for Gateway<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

impl<A: DatabaseAdapter> Gateway<A> {
    pub fn new(adapter: A, sink: Arc<dyn AuditSink>) -> Self {
        Self { adapter, sink }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn db_type(&self) -> DatabaseType {
        self.adapter.db_type()
    }

    /// Record a lifecycle event such as server start.
    pub fn record_event(&self, event: &str) {
        self.sink.record(
            &AuditEntry::success(SYSTEM_TOOL, 0).with_summary(json!({
                "event": event,
                "dialect": self.db_type(),
            })),
        );
    }

    /// Connect the adapter, recording the attempt either way.
    pub async fn connect(&self) -> DbResult<()> {
        let dialect = self.db_type();
        let result = self
            .audited(
                SYSTEM_TOOL,
                None,
                None,
                self.adapter.connect(),
                |_| json!({"event": "connect", "dialect": dialect}),
            )
            .await;
        match &result {
            Ok(()) => info!(dialect = %dialect, "Database ready"),
            Err(e) => warn!(dialect = %dialect, error = %e, "Database unavailable"),
        }
        result
    }

    pub async fn close(&self) {
        self.adapter.close().await;
    }

    /// Connect in the background so protocol start-up never waits on the
    /// database.
    pub fn spawn_connect(gateway: &Arc<Self>) -> JoinHandle<()>
    where
        A: Send + Sync + 'static,
    {
        let gateway = Arc::clone(gateway);
        tokio::spawn(async move {
            if gateway.connect().await.is_err() {
                info!("Continuing without a database connection");
            }
        })
    }

    /// Stop a pending background connect, then release the handle.
    ///
    /// A connect that finished after the transport closed the gateway has
    /// installed a fresh handle, so the close runs once the task is reaped.
    pub async fn shutdown(&self, connecting: JoinHandle<()>) {
        connecting.abort();
        let _ = connecting.await;
        self.close().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.adapter.is_connected().await
    }

    /// Run a read-only statement. Statements the validator refuses never
    /// reach the adapter but are still recorded.
    pub async fn read_query(&self, sql: &str, params: &[SqlValue]) -> DbResult<RowSet> {
        let db_type = self.db_type();
        self.audited(
            "read_query",
            Some(sql),
            params_json(params),
            async move {
                validate_readonly(sql, db_type)?;
                self.adapter.query(sql, params).await
            },
            |rows| json!({"rows": rows.len()}),
        )
        .await
    }

    pub async fn write_query(&self, sql: &str, params: &[SqlValue]) -> DbResult<WriteResult> {
        self.audited(
            "write_query",
            Some(sql),
            params_json(params),
            self.adapter.execute(sql, params),
            |result| serde_json::to_value(result).unwrap_or(JsonValue::Null),
        )
        .await
    }

    /// Record an operation refused before it reached the adapter.
    pub fn refuse(
        &self,
        tool: &str,
        query: Option<&str>,
        params: &[SqlValue],
        err: DbError,
    ) -> DbError {
        let mut entry = AuditEntry::failure(tool, 0, err.to_string());
        if let Some(query) = query {
            entry = entry.with_query(query);
        }
        if let Some(params) = params_json(params) {
            entry = entry.with_params(params);
        }
        self.sink.record(&entry);
        err
    }

    pub async fn list_tables(&self) -> DbResult<Vec<String>> {
        self.audited(
            "list_tables",
            None,
            None,
            self.adapter.list_tables(),
            |tables| json!({"table_count": tables.len()}),
        )
        .await
    }

    pub async fn describe_table(&self, name: &str) -> DbResult<TableInfo> {
        self.audited(
            "describe_table",
            None,
            Some(json!({"table_name": name})),
            self.adapter.describe_table(name),
            |info| json!({"columns": info.columns.len()}),
        )
        .await
    }

    pub async fn get_table_ddl(&self, name: &str) -> DbResult<Option<String>> {
        self.audited(
            "get_table_ddl",
            None,
            Some(json!({"table_name": name})),
            self.adapter.get_table_ddl(name),
            |ddl| json!({"found": ddl.is_some()}),
        )
        .await
    }

    /// Sample the first rows of a table. Returns the statement that worked.
    pub async fn inspect_table(&self, name: &str) -> DbResult<(String, RowSet)> {
        self.audited(
            "inspect_table",
            None,
            Some(json!({"table_name": name})),
            inspect_table(&self.adapter, name),
            |(sql, rows)| json!({"rows": rows.len(), "query": sql}),
        )
        .await
    }

    async fn audited<T, Fut>(
        &self,
        tool: &str,
        query: Option<&str>,
        params: Option<JsonValue>,
        operation: Fut,
        summary: impl FnOnce(&T) -> JsonValue,
    ) -> DbResult<T>
    where
        Fut: Future<Output = DbResult<T>>,
    {
        let started = Instant::now();
        let result = operation.await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let mut entry = match &result {
            Ok(value) => AuditEntry::success(tool, duration_ms).with_summary(summary(value)),
            Err(e) => AuditEntry::failure(tool, duration_ms, e.to_string()),
        };
        if let Some(query) = query {
            entry = entry.with_query(query);
        }
        if let Some(params) = params {
            entry = entry.with_params(params);
        }
        self.sink.record(&entry);
        result
    }
}

fn params_json(params: &[SqlValue]) -> Option<JsonValue> {
    if params.is_empty() {
        return None;
    }
    serde_json::to_value(params).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::db::create_adapter;

    fn gateway(sink: Arc<MemoryAuditSink>) -> Gateway {
        let adapter = create_adapter("mysql://u:p@127.0.0.1:1/app").unwrap();
        Gateway::new(adapter, sink)
    }

    #[tokio::test]
    async fn test_failures_are_recorded() {
        let sink = Arc::new(MemoryAuditSink::new());
        let gateway = gateway(sink.clone());

        let err = gateway
            .read_query("SELECT ?", &[SqlValue::Int(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotConnected { .. }));

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tool, "read_query");
        assert!(!entries[0].success);
        assert_eq!(entries[0].query.as_deref(), Some("SELECT ?"));
        assert_eq!(entries[0].params, Some(json!([1])));
        assert!(entries[0].error.as_deref().unwrap().contains("not connected"));
    }

    #[tokio::test]
    async fn test_table_operations_record_name() {
        let sink = Arc::new(MemoryAuditSink::new());
        let gateway = gateway(sink.clone());

        let _ = gateway.describe_table("bad name").await;
        let entries = sink.entries();
        assert_eq!(entries[0].tool, "describe_table");
        assert_eq!(entries[0].params, Some(json!({"table_name": "bad name"})));
    }

    #[tokio::test]
    async fn test_rejected_read_is_recorded() {
        let sink = Arc::new(MemoryAuditSink::new());
        let gateway = gateway(sink.clone());

        let err = gateway.read_query("DROP TABLE users", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::Permission { .. }), "{err}");

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tool, "read_query");
        assert!(!entries[0].success);
        assert_eq!(entries[0].query.as_deref(), Some("DROP TABLE users"));
    }

    #[test]
    fn test_refuse_records_failure() {
        let sink = Arc::new(MemoryAuditSink::new());
        let gateway = gateway(sink.clone());

        let err = gateway.refuse(
            "write_query",
            Some("DELETE FROM t"),
            &[],
            DbError::permission("write_query", "read-only"),
        );
        assert!(matches!(err, DbError::Permission { .. }));

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tool, "write_query");
        assert!(!entries[0].success);
        assert!(entries[0].params.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_reaps_pending_connect() {
        let sink = Arc::new(MemoryAuditSink::new());
        let gateway = Arc::new(gateway(sink));

        let connecting = Gateway::spawn_connect(&gateway);
        gateway.shutdown(connecting).await;
        assert!(!gateway.is_connected().await);
    }

    #[test]
    fn test_record_event() {
        let sink = Arc::new(MemoryAuditSink::new());
        let gateway = gateway(sink.clone());
        gateway.record_event("Server starting");

        let entries = sink.entries();
        assert_eq!(entries[0].tool, SYSTEM_TOOL);
        assert!(entries[0].success);
        assert_eq!(
            entries[0].result_summary,
            Some(json!({"event": "Server starting", "dialect": "mysql"}))
        );
    }
}
