//! Schema introspection tools.
//!
//! This module implements the `list_tables`, `describe_table`, `get_table_ddl`
//! and `inspect_table` MCP tools.

use crate::error::DbResult;
use crate::gateway::Gateway;
use crate::models::{RowSet, TableInfo};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Text returned by get_table_ddl when the dialect or table yields nothing.
pub const DDL_UNAVAILABLE: &str = "DDL not available for this table or database type.";

/// Input for the list_tables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {}

/// Input for tools that act on a single table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableNameInput {
    /// Table name. Letters, digits and underscores only.
    pub table_name: String,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize)]
pub struct ListTablesOutput {
    pub tables: Vec<String>,
    pub count: usize,
}

/// Output from the inspect_table tool.
#[derive(Debug, Clone, Serialize)]
pub struct InspectTableOutput {
    pub table: String,
    /// Sampling statement that succeeded
    pub query: String,
    pub rows: RowSet,
}

pub struct SchemaToolHandler {
    gateway: Arc<Gateway>,
}

impl SchemaToolHandler {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn list_tables(&self, _input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let tables = self.gateway.list_tables().await?;
        info!(count = tables.len(), "Listed tables");
        Ok(ListTablesOutput {
            count: tables.len(),
            tables,
        })
    }

    pub async fn describe_table(&self, input: TableNameInput) -> DbResult<TableInfo> {
        self.gateway.describe_table(&input.table_name).await
    }

    /// DDL text, or [`DDL_UNAVAILABLE`] when there is none.
    pub async fn get_table_ddl(&self, input: TableNameInput) -> DbResult<String> {
        let ddl = self.gateway.get_table_ddl(&input.table_name).await?;
        Ok(ddl.unwrap_or_else(|| DDL_UNAVAILABLE.to_string()))
    }

    pub async fn inspect_table(&self, input: TableNameInput) -> DbResult<InspectTableOutput> {
        let (query, rows) = self.gateway.inspect_table(&input.table_name).await?;
        info!(table = %input.table_name, query = %query, rows = rows.len(), "Sampled table");
        Ok(InspectTableOutput {
            table: input.table_name,
            query,
            rows,
        })
    }
}
