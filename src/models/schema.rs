//! Schema-related data models.
//!
//! This module defines the canonical table and column shapes produced by every
//! dialect's catalog queries. Declared types stay dialect-native.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Create a new table info.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Dialect-native type, e.g. "varchar(255)", "NUMBER", "INTEGER"
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    /// Key role, e.g. "PRI", "UNI", "MUL"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// e.g. "auto_increment"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl ColumnInfo {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            key: None,
            default: None,
            extra: None,
        }
    }

    /// Set the key role. Empty strings are treated as absent.
    pub fn with_key(mut self, key: Option<impl Into<String>>) -> Self {
        self.key = key.map(Into::into).filter(|k: &String| !k.is_empty());
        self
    }

    /// Set the default expression.
    pub fn with_default(mut self, default: Option<impl Into<String>>) -> Self {
        self.default = default.map(Into::into);
        self
    }

    /// Set the extra marker. Empty strings are treated as absent.
    pub fn with_extra(mut self, extra: Option<impl Into<String>>) -> Self {
        self.extra = extra.map(Into::into).filter(|e: &String| !e.is_empty());
        self
    }
}
