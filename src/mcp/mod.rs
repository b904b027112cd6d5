//! MCP server integration module.
//!
//! Binds the tool handlers to the rmcp framework. One `DbService` is built per
//! client session; all sessions share the process's single gateway.

pub mod service;

pub use service::DbService;
