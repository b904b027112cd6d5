//! Integration tests for the SQLite adapter through the public contract.
//!
//! Tests verify that:
//! - Every operation fails with NotConnected before connect
//! - Parameterized writes and reads round-trip
//! - Schema introspection (list, describe, DDL) reflects the real catalog
//! - Row sampling falls through to the first statement the dialect accepts
//! - close is idempotent and returns the adapter to the disconnected state

use multi_db_mcp::db::{Adapter, DatabaseAdapter, create_adapter, inspect_table};
use multi_db_mcp::error::DbError;
use multi_db_mcp::models::{DatabaseType, SqlValue};
use tempfile::TempDir;

fn sqlite_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("app.db").display())
}

/// Create a connected adapter with a seeded `users` table.
async fn setup_db(dir: &TempDir) -> Adapter {
    let adapter = create_adapter(&sqlite_url(dir)).unwrap();
    assert_eq!(adapter.db_type(), DatabaseType::SQLite);
    adapter.connect().await.unwrap();

    adapter
        .execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER DEFAULT 0)",
            &[],
        )
        .await
        .unwrap();
    for (name, age) in [("alice", 30), ("bob", 25)] {
        adapter
            .execute(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[SqlValue::from(name), SqlValue::from(age)],
            )
            .await
            .unwrap();
    }
    adapter
}

#[tokio::test]
async fn test_operations_fail_before_connect() {
    let dir = TempDir::new().unwrap();
    let adapter = create_adapter(&sqlite_url(&dir)).unwrap();

    assert!(!adapter.is_connected().await);
    let err = adapter.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::NotConnected { .. }), "{err}");
    let err = adapter.execute("DELETE FROM t", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::NotConnected { .. }), "{err}");
    let err = adapter.list_tables().await.unwrap_err();
    assert!(matches!(err, DbError::NotConnected { .. }), "{err}");

    // Creating the adapter never touches the filesystem
    assert!(!dir.path().join("app.db").exists());
}

#[tokio::test]
async fn test_parameterized_round_trip() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    let result = adapter
        .execute(
            "INSERT INTO users (name, age) VALUES (?, ?)",
            &[SqlValue::from("carol"), SqlValue::Null],
        )
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 1);
    assert_eq!(result.last_insert_id, Some(3));

    let rows = adapter
        .query(
            "SELECT id, name, age FROM users WHERE name = ?",
            &[SqlValue::from("carol")],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns(), ["id", "name", "age"]);
    assert_eq!(rows[0].get("id"), Some(&SqlValue::Int(3)));
    assert_eq!(rows[0].get("name"), Some(&SqlValue::Text("carol".into())));
    assert_eq!(rows[0].get("age"), Some(&SqlValue::Null));
}

#[tokio::test]
async fn test_single_column_round_trip() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;
    adapter.execute("CREATE TABLE t (a INTEGER)", &[]).await.unwrap();

    adapter
        .execute("INSERT INTO t(a) VALUES (?)", &[SqlValue::Int(1)])
        .await
        .unwrap();
    let rows = adapter.query("SELECT * FROM t", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("a"), Some(&SqlValue::Int(1)));
}

#[tokio::test]
async fn test_rows_keep_database_order() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    let rows = adapter
        .query("SELECT name FROM users ORDER BY age ASC", &[])
        .await
        .unwrap();
    let names: Vec<_> = rows
        .iter()
        .map(|row| row.get("name").and_then(SqlValue::as_str).unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["bob", "alice"]);
}

#[tokio::test]
async fn test_update_reports_rows_affected() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    let result = adapter
        .execute("UPDATE users SET age = age + 1", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 2);
}

#[tokio::test]
async fn test_driver_errors_keep_message() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    let err = adapter
        .query("SELECT * FROM missing_table", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Driver { .. }), "{err}");
    assert!(err.to_string().contains("missing_table"), "{err}");

    // The adapter stays usable after a failed statement
    assert!(adapter.query("SELECT 1", &[]).await.is_ok());
}

#[tokio::test]
async fn test_list_tables_hides_internal_tables() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;
    adapter
        .execute("CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT)", &[])
        .await
        .unwrap();

    let mut tables = adapter.list_tables().await.unwrap();
    tables.sort();
    // AUTOINCREMENT creates sqlite_sequence, which must not be listed
    assert_eq!(tables, vec!["orders", "users"]);
}

#[tokio::test]
async fn test_describe_table() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    let info = adapter.describe_table("users").await.unwrap();
    assert_eq!(info.name, "users");
    assert_eq!(info.columns.len(), 3);

    let id = &info.columns[0];
    assert_eq!(id.name, "id");
    assert_eq!(id.data_type, "INTEGER");
    assert_eq!(id.key.as_deref(), Some("PRI"));

    let name = &info.columns[1];
    assert!(!name.nullable);
    assert!(name.key.is_none());

    let age = &info.columns[2];
    assert!(age.nullable);
    assert_eq!(age.default.as_deref(), Some("0"));
}

#[tokio::test]
async fn test_describe_missing_table() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    let err = adapter.describe_table("nope").await.unwrap_err();
    assert!(matches!(err, DbError::TableNotFound { .. }), "{err}");
}

#[tokio::test]
async fn test_table_ddl() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    let ddl = adapter.get_table_ddl("users").await.unwrap().unwrap();
    assert!(ddl.starts_with("CREATE TABLE users"), "{ddl}");

    assert_eq!(adapter.get_table_ddl("nope").await.unwrap(), None);
}

#[tokio::test]
async fn test_invalid_names_never_reach_the_database() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    for name in ["users; DROP TABLE users", "users'", "a b", ""] {
        let err = adapter.describe_table(name).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidName { .. }), "{name}: {err}");
        let err = adapter.get_table_ddl(name).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidName { .. }), "{name}: {err}");
    }
    assert_eq!(adapter.list_tables().await.unwrap(), vec!["users"]);
}

#[tokio::test]
async fn test_inspect_table_uses_limit() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;
    for i in 0..10 {
        adapter
            .execute(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[SqlValue::Text(format!("user{i}")), SqlValue::Int(i)],
            )
            .await
            .unwrap();
    }

    let (sql, rows) = inspect_table(&adapter, "users").await.unwrap();
    assert_eq!(sql, "SELECT * FROM users LIMIT 5");
    assert_eq!(rows.len(), 5);
}

#[tokio::test]
async fn test_inspect_missing_table_returns_last_failure() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    let err = inspect_table(&adapter, "nope").await.unwrap_err();
    assert!(matches!(err, DbError::Driver { .. }), "{err}");
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let adapter = setup_db(&dir).await;

    adapter.close().await;
    adapter.close().await;
    assert!(!adapter.is_connected().await);

    let err = adapter.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::NotConnected { .. }));

    // Reconnecting sees the data written before close
    adapter.connect().await.unwrap();
    let rows = adapter.query("SELECT COUNT(*) AS n FROM users", &[]).await.unwrap();
    assert_eq!(rows[0].get("n"), Some(&SqlValue::Int(2)));
}
