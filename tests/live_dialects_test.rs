//! Round-trip tests against real servers.
//!
//! Each test requires a running database and is skipped unless its
//! environment variable is set:
//! TEST_MYSQL_URL, TEST_POSTGRES_URL, TEST_MSSQL_URL, TEST_ORACLE_URL.

use multi_db_mcp::db::{DatabaseAdapter, create_adapter, inspect_table};
use multi_db_mcp::models::{DatabaseType, SqlValue};

const TABLE: &str = "mcp_live_test";

fn live_url(env_var: &str) -> Option<String> {
    match std::env::var(env_var) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: {env_var} not set");
            None
        }
    }
}

async fn round_trip(env_var: &str) {
    let Some(url) = live_url(env_var) else {
        return;
    };

    let adapter = create_adapter(&url).unwrap();
    adapter.connect().await.unwrap();

    // PostgreSQL statements are sent untranslated
    let (p1, p2) = match adapter.db_type() {
        DatabaseType::PostgreSQL => ("$1", "$2"),
        _ => ("?", "?"),
    };
    let _ = adapter.execute(&format!("DROP TABLE {TABLE}"), &[]).await;

    adapter
        .execute(
            &format!("CREATE TABLE {TABLE} (id INT NOT NULL, label VARCHAR(50))"),
            &[],
        )
        .await
        .unwrap();

    let result = adapter
        .execute(
            &format!("INSERT INTO {TABLE} (id, label) VALUES ({p1}, {p2})"),
            &[SqlValue::Int(1), SqlValue::from("live label")],
        )
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 1);

    // Writes are committed without an explicit commit
    let observer = create_adapter(&url).unwrap();
    observer.connect().await.unwrap();
    let seen = observer
        .query(&format!("SELECT id FROM {TABLE}"), &[])
        .await
        .unwrap();
    assert_eq!(seen.len(), 1);
    observer.close().await;

    let rows = adapter
        .query(
            &format!("SELECT id, label FROM {TABLE} WHERE id = {p1}"),
            &[SqlValue::Int(1)],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let label = rows[0]
        .get_ignore_case("label")
        .and_then(SqlValue::as_str)
        .unwrap();
    assert_eq!(label, "live label");

    let tables: Vec<String> = adapter
        .list_tables()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect();
    assert!(tables.contains(&TABLE.to_string()), "{tables:?}");

    let info = adapter.describe_table(TABLE).await.unwrap();
    assert_eq!(info.columns.len(), 2);
    assert!(!info.columns[0].nullable);

    let (_, sample) = inspect_table(&adapter, TABLE).await.unwrap();
    assert_eq!(sample.len(), 1);

    adapter.execute(&format!("DROP TABLE {TABLE}"), &[]).await.unwrap();
    adapter.close().await;
    adapter.close().await;
}

#[tokio::test]
async fn test_mysql_round_trip() {
    round_trip("TEST_MYSQL_URL").await;
}

#[tokio::test]
async fn test_postgres_round_trip() {
    round_trip("TEST_POSTGRES_URL").await;
}

#[tokio::test]
async fn test_mssql_round_trip() {
    round_trip("TEST_MSSQL_URL").await;
}

#[tokio::test]
async fn test_oracle_round_trip() {
    round_trip("TEST_ORACLE_URL").await;
}

#[tokio::test]
async fn test_postgres_untyped_values_keep_server_text() {
    let Some(url) = live_url("TEST_POSTGRES_URL") else {
        return;
    };
    let adapter = create_adapter(&url).unwrap();
    adapter.connect().await.unwrap();

    let rows = adapter
        .query(
            "SELECT INTERVAL '1 day' AS span, ARRAY[1, 2] AS ids, '127.0.0.1'::inet AS addr",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(rows[0].get("span"), Some(&SqlValue::Text("1 day".into())));
    assert_eq!(rows[0].get("ids"), Some(&SqlValue::Text("{1,2}".into())));
    assert_eq!(rows[0].get("addr"), Some(&SqlValue::Text("127.0.0.1".into())));

    adapter.close().await;
}
