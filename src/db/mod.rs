//! Database abstraction layer.
//!
//! This module provides one adapter contract and its dialect implementations:
//! - The `DatabaseAdapter` contract and identifier guard
//! - Connection handle lifecycle
//! - Placeholder translation
//! - Result normalization and parameter binding for sqlx dialects
//! - Ordered fallback chains and row sampling
//! - The adapter factory and its dispatch macro

pub mod adapter;
pub mod factory;
pub mod fallback;
pub mod inspect;
pub mod lifecycle;
#[macro_use]
pub mod macros;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub(crate) mod params;
pub mod placeholder;
pub mod postgres;
pub mod sqlite;
pub mod types;

pub use adapter::{AdapterOptions, DEFAULT_MAX_CONNECTIONS, DatabaseAdapter, validate_table_name};
pub use factory::{Adapter, create_adapter, create_adapter_with};
pub use inspect::inspect_table;
pub use lifecycle::AdapterHandle;
pub use placeholder::{BoundParam, PlaceholderStyle, TranslatedQuery, translate};
