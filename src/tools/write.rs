//! Write operation tool.
//!
//! This module implements the `write_query` MCP tool for INSERT, UPDATE,
//! DELETE and DDL statements. The tool is withheld in read-only mode.

use crate::error::{DbError, DbResult};
use crate::gateway::Gateway;
use crate::models::WriteResult;
use crate::tools::query::params_from_json;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the write_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteQueryInput {
    /// SQL statement to execute (INSERT, UPDATE, DELETE, or DDL like CREATE/DROP/ALTER)
    pub query: String,
    /// Positional parameters. Use `?` placeholders; PostgreSQL takes `$1, $2...` instead.
    #[serde(default)]
    pub params: Option<Vec<JsonValue>>,
}

pub struct WriteToolHandler {
    gateway: Arc<Gateway>,
    read_only: bool,
}

impl WriteToolHandler {
    pub fn new(gateway: Arc<Gateway>, read_only: bool) -> Self {
        Self { gateway, read_only }
    }

    pub async fn write_query(&self, input: WriteQueryInput) -> DbResult<WriteResult> {
        let params = params_from_json(input.params.as_deref());
        if self.read_only {
            return Err(self.gateway.refuse(
                "write_query",
                Some(&input.query),
                &params,
                DbError::permission("write_query", "Server is running in read-only mode"),
            ));
        }

        let result = self.gateway.write_query(&input.query, &params).await?;

        info!(rows_affected = result.rows_affected, "Write executed");
        Ok(result)
    }
}
