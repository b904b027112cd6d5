//! Result normalization for the sqlx-backed dialects.
//!
//! This module converts driver rows into canonical [`Row`] values.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! Values the canonical model has no scalar for (DECIMAL, dates, UUID, JSON) are
//! rendered as text so nothing loses precision. A non-null PostgreSQL value
//! that no typed decode accepts falls back to its raw text or bytes.

use crate::models::{DatabaseType, Row, SqlValue};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Temporal,
    Text,
    Binary,
    Json,
    Uuid,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Arrays have no canonical scalar form
    if lower.ends_with("[]") {
        return TypeCategory::Unknown;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower == "interval" {
        return TypeCategory::Text;
    }

    if lower.contains("date") || lower.contains("time") {
        return TypeCategory::Temporal;
    }

    if (lower.contains("int") && !lower.contains("point")) || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower == "year" {
        return TypeCategory::Integer;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row Conversion Trait
// =============================================================================

/// Trait for converting driver rows into canonical rows.
pub trait RowToCanonical {
    fn to_row(&self) -> Row;
}

impl RowToCanonical for MySqlRow {
    fn to_row(&self) -> Row {
        let mut row = Row::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
            row.push(col.name(), mysql::decode_column(self, idx, category));
        }
        row
    }
}

impl RowToCanonical for PgRow {
    fn to_row(&self) -> Row {
        let mut row = Row::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
            row.push(col.name(), postgres::decode_column(self, idx, category));
        }
        row
    }
}

impl RowToCanonical for SqliteRow {
    fn to_row(&self) -> Row {
        let mut row = Row::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let category = categorize_type(col.type_info().name(), DatabaseType::SQLite);
            row.push(col.name(), sqlite::decode_column(self, idx, category));
        }
        row
    }
}

/// Convert a slice of driver rows.
pub fn to_row_set<R: RowToCanonical>(rows: &[R]) -> Vec<Row> {
    rows.iter().map(RowToCanonical::to_row).collect()
}

fn float_value(v: f64) -> SqlValue {
    SqlValue::Float(v)
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> SqlValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> SqlValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => SqlValue::Text(v.0),
            Ok(None) => SqlValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                SqlValue::Null
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> SqlValue {
        // Check NULL first
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return SqlValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return SqlValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return SqlValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return SqlValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return SqlValue::Int(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u8>, _>(idx) {
            return SqlValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return SqlValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return SqlValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            // BIGINT UNSIGNED beyond i64 keeps its digits as text
            return i64::try_from(v)
                .map(SqlValue::Int)
                .unwrap_or_else(|_| SqlValue::Text(v.to_string()));
        }
        SqlValue::Null
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> SqlValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> SqlValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v.into());
        }
        SqlValue::Null
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> SqlValue {
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return SqlValue::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return SqlValue::Text(v.to_rfc3339());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return SqlValue::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return SqlValue::Text(v.to_string());
        }
        decode_text(row, idx)
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> SqlValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null)
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> SqlValue {
        row.try_get::<Option<serde_json::Value>, _>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Text(v.to_string()))
            .unwrap_or(SqlValue::Null)
    }

    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn decode_text(row: &MySqlRow, idx: usize) -> SqlValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return SqlValue::Text(v);
        }
        match row.try_get::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(s) => SqlValue::Text(s),
                Err(e) => SqlValue::Bytes(e.into_bytes()),
            },
            _ => SqlValue::Null,
        }
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::ValueRef;
    use sqlx::postgres::PgValueFormat;

    /// Typed decode first; values no typed decode accepts (INTERVAL, TIMETZ,
    /// arrays, network types) come back as the server's own rendering.
    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> SqlValue {
        match decode_typed(row, idx, category) {
            SqlValue::Null => decode_raw(row, idx),
            value => value,
        }
    }

    fn decode_typed(row: &PgRow, idx: usize, category: TypeCategory) -> SqlValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> SqlValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => SqlValue::Text(v.0),
            Ok(None) => SqlValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                SqlValue::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> SqlValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return SqlValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return SqlValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return SqlValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return SqlValue::Int(v);
        }
        SqlValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> SqlValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> SqlValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v.into());
        }
        SqlValue::Null
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> SqlValue {
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return SqlValue::Text(v.to_rfc3339());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return SqlValue::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return SqlValue::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return SqlValue::Text(v.to_string());
        }
        SqlValue::Null
    }

    fn decode_binary(row: &PgRow, idx: usize) -> SqlValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> SqlValue {
        row.try_get::<Option<serde_json::Value>, _>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Text(v.to_string()))
            .unwrap_or(SqlValue::Null)
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> SqlValue {
        row.try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Text(v.to_string()))
            .unwrap_or(SqlValue::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> SqlValue {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null)
    }

    /// Text-format values (the unparameterized path) keep their text;
    /// binary-format values are passed through as bytes.
    fn decode_raw(row: &PgRow, idx: usize) -> SqlValue {
        let raw = match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => raw,
            _ => return SqlValue::Null,
        };
        match raw.format() {
            PgValueFormat::Text => raw
                .as_str()
                .map(|s| SqlValue::Text(s.to_string()))
                .unwrap_or(SqlValue::Null),
            PgValueFormat::Binary => raw
                .as_bytes()
                .map(|b| SqlValue::Bytes(b.to_vec()))
                .unwrap_or(SqlValue::Null),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::ValueRef;

    /// SQLite is dynamically typed, so the stored value's class decides the
    /// decoding; the declared type only distinguishes booleans.
    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> SqlValue {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return SqlValue::Null,
            Ok(raw) => raw.type_info().name().to_uppercase(),
            Err(_) => return SqlValue::Null,
        };

        match storage.as_str() {
            "INTEGER" if category == TypeCategory::Boolean => decode_boolean(row, idx),
            "INTEGER" => decode_integer(row, idx),
            "REAL" => decode_float(row, idx),
            "BLOB" => decode_binary(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> SqlValue {
        row.try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Int)
            .unwrap_or(SqlValue::Null)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> SqlValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bool)
            .unwrap_or_else(|| decode_integer(row, idx))
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> SqlValue {
        row.try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(float_value)
            .unwrap_or(SqlValue::Null)
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> SqlValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null)
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> SqlValue {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null)
    }
}
