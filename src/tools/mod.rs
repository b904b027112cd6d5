//! MCP tool implementations.
//!
//! This module contains all database tool handlers:
//! - `read_query`: Execute SELECT queries
//! - `write_query`: Execute write operations (INSERT/UPDATE/DELETE/DDL)
//! - `list_tables`: List tables in the database
//! - `describe_table`: Get column information for a table
//! - `get_table_ddl`: Get the CREATE statement for a table
//! - `inspect_table`: Sample the first rows of a table
//! - `sql_validator`: SQL statement validation for read-only enforcement

pub mod query;
pub mod schema;
pub mod sql_validator;
pub mod write;

pub use query::{QueryToolHandler, ReadQueryInput, params_from_json};
pub use schema::{
    DDL_UNAVAILABLE, InspectTableOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
    TableNameInput,
};
pub use write::{WriteQueryInput, WriteToolHandler};
