//! Data models shared by the adapters and the tool layer.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionTarget, ConnectionTargetError, DatabaseType, SUPPORTED_SCHEMES};
pub use query::{Row, RowSet, SqlValue, WriteResult};
pub use schema::{ColumnInfo, TableInfo};
