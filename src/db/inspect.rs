//! Row sampling across dialects.
//!
//! There is no portable "first N rows" syntax, so the candidates are tried in a
//! fixed order: `LIMIT` (MySQL, PostgreSQL, SQLite), `TOP` (SQL Server), then
//! `ROWNUM` (Oracle).

use crate::db::adapter::{DatabaseAdapter, validate_table_name};
use crate::db::fallback::first_success;
use crate::error::DbResult;
use crate::models::RowSet;

/// Rows returned by [`inspect_table`].
pub const SAMPLE_ROWS: usize = 5;

/// Candidate sampling statements, in the order they are attempted.
pub fn sample_queries(table: &str) -> [String; 3] {
    [
        format!("SELECT * FROM {table} LIMIT {SAMPLE_ROWS}"),
        format!("SELECT TOP {SAMPLE_ROWS} * FROM {table}"),
        format!("SELECT * FROM {table} WHERE ROWNUM <= {SAMPLE_ROWS}"),
    ]
}

/// Return the first rows of `name` and the statement that produced them.
///
/// The name is validated before anything runs. When every candidate fails the
/// last failure is returned.
pub async fn inspect_table<A: DatabaseAdapter>(adapter: &A, name: &str) -> DbResult<(String, RowSet)> {
    validate_table_name(name)?;
    let candidates = sample_queries(name);

    let (idx, rows) = first_success(&candidates, |sql| {
        let sql = sql.clone();
        async move { adapter.query(&sql, &[]).await }
    })
    .await?;

    Ok((candidates[idx].clone(), rows))
}
