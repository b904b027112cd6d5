//! MCP service implementation using rmcp.
//!
//! This module defines the DbService struct with all database tools exposed
//! via the MCP protocol using the rmcp framework's macros. Results are
//! returned as pretty-printed JSON text; operation failures become error
//! results so the session stays alive.

use crate::error::DbResult;
use crate::gateway::Gateway;
use crate::tools::query::{QueryToolHandler, ReadQueryInput};
use crate::tools::schema::{ListTablesInput, SchemaToolHandler, TableNameInput};
use crate::tools::write::{WriteQueryInput, WriteToolHandler};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct DbService {
    gateway: Arc<Gateway>,
    read_only: bool,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl DbService {
    /// Create a new DbService over a shared gateway.
    ///
    /// In read-only mode `write_query` is removed from the tool list.
    pub fn new(gateway: Arc<Gateway>, read_only: bool) -> Self {
        let mut tool_router = Self::tool_router();
        if read_only {
            tool_router.remove_route("write_query");
        }
        Self {
            gateway,
            read_only,
            tool_router,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Render an operation outcome as tool output.
fn to_tool_result<T: Serialize>(result: DbResult<T>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
        Err(e) => Ok(error_result(&e)),
    }
}

fn error_result(err: &dyn std::fmt::Display) -> CallToolResult {
    debug!(error = %err, "Tool call failed");
    CallToolResult::error(vec![Content::text(format!("Error: {err}"))])
}

#[tool_router]
impl DbService {
    #[tool(
        description = "Execute a read-only SELECT query and return the rows as JSON.\nUse `?` placeholders with the params array; PostgreSQL takes `$1, $2...` instead.\nWrite statements are rejected."
    )]
    async fn read_query(
        &self,
        Parameters(input): Parameters<ReadQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = QueryToolHandler::new(self.gateway.clone());
        to_tool_result(handler.read_query(input).await)
    }

    #[tool(
        description = "Execute a write statement (INSERT, UPDATE, DELETE or DDL).\nReturns rows_affected and, where the database reports it, last_insert_id."
    )]
    async fn write_query(
        &self,
        Parameters(input): Parameters<WriteQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = WriteToolHandler::new(self.gateway.clone(), self.read_only);
        to_tool_result(handler.write_query(input).await)
    }

    #[tool(description = "List the user tables in the connected database.")]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.gateway.clone());
        to_tool_result(handler.list_tables(input).await)
    }

    #[tool(
        description = "Describe a table's columns: name, type, nullability, key, default and extra."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<TableNameInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.gateway.clone());
        to_tool_result(handler.describe_table(input).await)
    }

    #[tool(
        description = "Get the CREATE statement for a table.\nAvailable for MySQL, SQLite and Oracle."
    )]
    async fn get_table_ddl(
        &self,
        Parameters(input): Parameters<TableNameInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.gateway.clone());
        match handler.get_table_ddl(input).await {
            Ok(ddl) => Ok(CallToolResult::success(vec![Content::text(ddl)])),
            Err(e) => Ok(error_result(&e)),
        }
    }

    #[tool(description = "Return the first 5 rows of a table.")]
    async fn inspect_table(
        &self,
        Parameters(input): Parameters<TableNameInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.gateway.clone());
        to_tool_result(handler.inspect_table(input).await)
    }
}

#[tool_handler]
impl ServerHandler for DbService {
    fn get_info(&self) -> ServerInfo {
        let db_type = self.gateway.db_type();
        let mode = if self.read_only {
            "Read-only: `write_query` is not available."
        } else {
            "Read-write: `write_query` is available."
        };
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "multi-db-mcp".to_owned(),
                title: Some("Multi-Database MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Database tools for a single {} database.\n\
                \n\
                ## Workflow\n\
                1. Call `list_tables` to see what exists\n\
                2. Use `describe_table` or `inspect_table` to learn a table's shape\n\
                3. Query with `read_query`\n\
                \n\
                ## Parameters\n\
                {}\n\
                \n\
                ## Mode\n\
                {}",
                db_type.display_name(),
                db_type.placeholder_hint(),
                mode,
            )),
        }
    }
}
