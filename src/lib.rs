//! Multi-Database MCP Server Library
//!
//! This library exposes one database, chosen by its connection URL, to MCP
//! clients through a fixed tool set. MySQL, PostgreSQL, SQLite, SQL Server and
//! Oracle all sit behind the same [`DatabaseAdapter`](db::DatabaseAdapter)
//! contract, and every operation is recorded to an injected audit sink.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use audit::{AuditEntry, AuditSink, JsonlAuditSink, MemoryAuditSink, NoopAuditSink};
pub use config::Config;
pub use db::{Adapter, DatabaseAdapter, create_adapter};
pub use error::{DbError, DbResult};
pub use gateway::Gateway;
pub use mcp::DbService;
