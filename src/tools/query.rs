//! Query execution tool.
//!
//! This module implements the `read_query` MCP tool. The gateway checks each
//! statement against the connected dialect's grammar before it reaches the
//! database, and records refusals like any other failure.

use crate::error::DbResult;
use crate::gateway::Gateway;
use crate::models::{RowSet, SqlValue};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the read_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadQueryInput {
    /// SQL SELECT statement to execute. Write operations are blocked.
    pub query: String,
    /// Positional parameters. Use `?` placeholders; PostgreSQL takes `$1, $2...` instead.
    #[serde(default)]
    pub params: Option<Vec<JsonValue>>,
}

/// Convert JSON tool arguments into bindable values.
pub fn params_from_json(params: Option<&[JsonValue]>) -> Vec<SqlValue> {
    params
        .unwrap_or_default()
        .iter()
        .map(SqlValue::from_json)
        .collect()
}

pub struct QueryToolHandler {
    gateway: Arc<Gateway>,
}

impl QueryToolHandler {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Validate and run a read-only statement.
    pub async fn read_query(&self, input: ReadQueryInput) -> DbResult<RowSet> {
        let params = params_from_json(input.params.as_deref());
        let rows = self.gateway.read_query(&input.query, &params).await?;

        info!(rows = rows.len(), params = params.len(), "Query executed");
        Ok(rows)
    }
}
