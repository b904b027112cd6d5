//! Integration tests for the tool handlers and the audit trail they leave.
//!
//! Tests verify that:
//! - read_query rejects writes before they reach the database
//! - read_query refuses unparseable multi-statement text
//! - write_query is refused in read-only mode
//! - Refusals are recorded like any other failure
//! - Every operation, failed or not, produces exactly one audit record
//! - The JSONL sink writes one parseable line per record

use multi_db_mcp::audit::{AuditSink, JsonlAuditSink, MemoryAuditSink, SYSTEM_TOOL};
use multi_db_mcp::db::create_adapter;
use multi_db_mcp::error::DbError;
use multi_db_mcp::gateway::Gateway;
use multi_db_mcp::models::SqlValue;
use multi_db_mcp::tools::{
    DDL_UNAVAILABLE, ListTablesInput, QueryToolHandler, ReadQueryInput, SchemaToolHandler,
    TableNameInput, WriteQueryInput, WriteToolHandler,
};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup(dir: &TempDir, sink: Arc<dyn AuditSink>) -> Arc<Gateway> {
    let url = format!("sqlite://{}", dir.path().join("app.db").display());
    let gateway = Arc::new(Gateway::new(create_adapter(&url).unwrap(), sink));
    gateway.connect().await.unwrap();

    let writer = WriteToolHandler::new(gateway.clone(), false);
    writer
        .write_query(WriteQueryInput {
            query: "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT)".to_string(),
            params: None,
        })
        .await
        .unwrap();
    writer
        .write_query(WriteQueryInput {
            query: "INSERT INTO items (label) VALUES (?), (?)".to_string(),
            params: Some(vec![json!("first"), json!("second")]),
        })
        .await
        .unwrap();
    gateway
}

fn table(name: &str) -> TableNameInput {
    TableNameInput {
        table_name: name.to_string(),
    }
}

#[tokio::test]
async fn test_tool_flow_is_audited() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = setup(&dir, sink.clone()).await;

    let rows = QueryToolHandler::new(gateway.clone())
        .read_query(ReadQueryInput {
            query: "SELECT label FROM items WHERE id = ?".to_string(),
            params: Some(vec![json!(2)]),
        })
        .await
        .unwrap();
    assert_eq!(serde_json::to_value(&rows).unwrap(), json!([{"label": "second"}]));

    let schema = SchemaToolHandler::new(gateway.clone());
    let listed = schema.list_tables(ListTablesInput {}).await.unwrap();
    assert_eq!(listed.tables, vec!["items"]);
    assert_eq!(listed.count, 1);

    let info = schema.describe_table(table("items")).await.unwrap();
    assert_eq!(info.columns.len(), 2);

    let ddl = schema.get_table_ddl(table("items")).await.unwrap();
    assert!(ddl.contains("CREATE TABLE items"), "{ddl}");
    let missing = schema.get_table_ddl(table("nothing")).await.unwrap();
    assert_eq!(missing, DDL_UNAVAILABLE);

    let sample = schema.inspect_table(table("items")).await.unwrap();
    assert_eq!(sample.query, "SELECT * FROM items LIMIT 5");
    assert_eq!(sample.rows.len(), 2);

    let entries = sink.entries();
    let tools: Vec<_> = entries.iter().map(|e| e.tool.as_str()).collect();
    assert_eq!(
        tools,
        vec![
            SYSTEM_TOOL,
            "write_query",
            "write_query",
            "read_query",
            "list_tables",
            "describe_table",
            "get_table_ddl",
            "get_table_ddl",
            "inspect_table",
        ]
    );
    assert!(entries.iter().all(|e| e.success));

    let insert = &entries[2];
    assert_eq!(insert.params, Some(json!(["first", "second"])));
    assert_eq!(insert.result_summary.as_ref().unwrap()["rows_affected"], 2);

    let read = &entries[3];
    assert_eq!(read.query.as_deref(), Some("SELECT label FROM items WHERE id = ?"));
    assert_eq!(read.result_summary, Some(json!({"rows": 1})));

    assert_eq!(entries[4].result_summary, Some(json!({"table_count": 1})));
    assert_eq!(entries[5].result_summary, Some(json!({"columns": 2})));
    assert_eq!(entries[6].result_summary, Some(json!({"found": true})));
    assert_eq!(entries[7].result_summary, Some(json!({"found": false})));
    assert_eq!(
        entries[8].result_summary.as_ref().unwrap()["query"],
        "SELECT * FROM items LIMIT 5"
    );
}

#[tokio::test]
async fn test_read_query_rejects_writes_before_execution() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = setup(&dir, sink.clone()).await;
    let before = sink.entries().len();

    let err = QueryToolHandler::new(gateway.clone())
        .read_query(ReadQueryInput {
            query: "DELETE FROM items".to_string(),
            params: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Permission { .. }), "{err}");

    // The refusal is recorded once and the rows are intact
    let entries = sink.entries();
    assert_eq!(entries.len(), before + 1);
    let refused = &entries[before];
    assert_eq!(refused.tool, "read_query");
    assert!(!refused.success);
    assert_eq!(refused.query.as_deref(), Some("DELETE FROM items"));
    assert!(refused.error.as_deref().unwrap().contains("write_query"));

    let rows = gateway.read_query("SELECT * FROM items", &[]).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_read_query_rejects_unparseable_batches() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = setup(&dir, sink.clone()).await;
    let reader = QueryToolHandler::new(gateway.clone());

    for query in [
        "SELECT 1; DELETE FROM items; SELECT 1 FROM items NOT INDEXED",
        "SELECT 1; DELETE FROM items; SELECT '",
    ] {
        let err = reader
            .read_query(ReadQueryInput {
                query: query.to_string(),
                params: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Permission { .. }), "{query}: {err}");
    }

    let rows = gateway
        .read_query("SELECT COUNT(*) AS n FROM items", &[])
        .await
        .unwrap();
    assert_eq!(rows[0].get("n"), Some(&SqlValue::Int(2)));
}

#[tokio::test]
async fn test_write_query_refused_in_read_only_mode() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = setup(&dir, sink.clone()).await;

    let err = WriteToolHandler::new(gateway.clone(), true)
        .write_query(WriteQueryInput {
            query: "DELETE FROM items".to_string(),
            params: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Permission { .. }), "{err}");

    let last = sink.entries().pop().unwrap();
    assert_eq!(last.tool, "write_query");
    assert!(!last.success);
    assert_eq!(last.query.as_deref(), Some("DELETE FROM items"));

    let rows = gateway.read_query("SELECT * FROM items", &[]).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_failures_are_recorded() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = setup(&dir, sink.clone()).await;

    let err = SchemaToolHandler::new(gateway.clone())
        .describe_table(table("items; --"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidName { .. }));

    let last = sink.entries().pop().unwrap();
    assert_eq!(last.tool, "describe_table");
    assert!(!last.success);
    assert!(last.error.unwrap().contains("Invalid table name"));
    assert_eq!(last.params, Some(json!({"table_name": "items; --"})));
}

#[tokio::test]
async fn test_jsonl_sink_receives_every_operation() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(JsonlAuditSink::new(dir.path().join("logs")));
    let gateway = setup(&dir, sink.clone()).await;
    gateway.record_event("Server starting");
    gateway.list_tables().await.unwrap();

    let content = std::fs::read_to_string(sink.current_file()).unwrap();
    let records: Vec<JsonValue> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    // connect, two writes, the event, list_tables
    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["tool"], "system");
    assert_eq!(records[0]["result_summary"]["event"], "connect");
    assert_eq!(records[3]["result_summary"]["event"], "Server starting");
    assert_eq!(records[4]["tool"], "list_tables");
    assert!(records.iter().all(|r| r["timestamp"].is_string()));
    assert!(records.iter().all(|r| r["duration_ms"].is_u64()));
}
