//! Query-related data models.
//!
//! This module defines the canonical value, row and write-result shapes every
//! adapter produces regardless of dialect.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A single scalar value, either bound as a parameter or read from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Serialized as base64 text
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Convert a JSON tool argument into a bindable value.
    ///
    /// Arrays and objects are bound as their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            JsonValue::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Bytes(v) => serializer.serialize_str(&STANDARD.encode(v)),
        }
    }
}

/// One result row: column names in driver order paired with their values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a row with capacity for `n` columns.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            columns: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
        }
    }

    /// Append a column. A repeated name shadows the earlier one on lookup.
    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        self.columns.push(column.into());
        self.values.push(value);
    }

    /// Builder-style [`Row::push`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value.into());
        self
    }

    /// Look up a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .rposition(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Look up a value by column name, ignoring ASCII case.
    pub fn get_ignore_case(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .rposition(|c| c.eq_ignore_ascii_case(column))
            .map(|idx| &self.values[idx])
    }

    /// Value at a column position.
    pub fn value_at(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Ordered sequence of rows, in the order the database returned them.
pub type RowSet = Vec<Row>;

/// Summary of a write statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteResult {
    pub rows_affected: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
    /// Rows produced by `RETURNING` clauses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<RowSet>,
    /// Leading command keyword (PostgreSQL), e.g. "INSERT"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl WriteResult {
    /// Create a write result with the mandatory row count.
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Set the last inserted identifier.
    pub fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }

    /// Set rows returned by the statement.
    pub fn with_rows(mut self, rows: RowSet) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Set the command tag.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_serializes_in_column_order() {
        let row = Row::new().with("z", 1).with("a", "x").with("m", SqlValue::Null);
        let text = serde_json::to_string(&row).unwrap();
        assert_eq!(text, r#"{"z":1,"a":"x","m":null}"#);
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let row = Row::new().with("blob", SqlValue::Bytes(b"hello world".to_vec()));
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({ "blob": "aGVsbG8gd29ybGQ=" })
        );
    }

    #[test]
    fn test_row_lookup() {
        let row = Row::new().with("ID", 7).with("name", "bob");
        assert_eq!(row.get("ID"), Some(&SqlValue::Int(7)));
        assert_eq!(row.get("id"), None);
        assert_eq!(row.get_ignore_case("id"), Some(&SqlValue::Int(7)));
        assert_eq!(row.value_at(1).and_then(SqlValue::as_str), Some("bob"));
    }

    #[test]
    fn test_from_json_params() {
        assert_eq!(SqlValue::from_json(&json!(null)), SqlValue::Null);
        assert_eq!(SqlValue::from_json(&json!(true)), SqlValue::Bool(true));
        assert_eq!(SqlValue::from_json(&json!(42)), SqlValue::Int(42));
        assert_eq!(SqlValue::from_json(&json!(1.5)), SqlValue::Float(1.5));
        assert_eq!(SqlValue::from_json(&json!("x")), SqlValue::Text("x".into()));
        assert_eq!(
            SqlValue::from_json(&json!({"k": 1})),
            SqlValue::Text(r#"{"k":1}"#.into())
        );
    }

    #[test]
    fn test_write_result_skips_absent_fields() {
        let result = WriteResult::new(3).with_last_insert_id(10);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "rows_affected": 3, "last_insert_id": 10 })
        );
    }
}
