//! Row decoding for the sqlx driver.
//!
//! Decoding uses a two-phase approach:
//! 1. `TypeCategory` classifies the value's type name into a logical category
//! 2. the category picks the Rust type to decode into, falling back to the
//!    other categories when the backend reports something unexpected

use crate::error::{DbError, DbResult};
use crate::models::Value;
use sqlx::any::AnyRow;
use sqlx::{Row, TypeInfo, ValueRef};

/// Logical category for column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Text,
    Binary,
    Unknown,
}

/// Classify a type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Integer types
    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Float types
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "numeric"
    {
        return TypeCategory::Float;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower.contains("clob") {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Decode every column of `row`.
pub fn decode_row(row: &AnyRow) -> DbResult<Vec<Value>> {
    (0..row.len()).map(|idx| decode_column(row, idx)).collect()
}

fn decode_column(row: &AnyRow, idx: usize) -> DbResult<Value> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let preferred = match categorize_type(&type_name) {
        TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(Value::Bool),
        TypeCategory::Integer => decode_integer(row, idx),
        TypeCategory::Float => decode_float(row, idx),
        TypeCategory::Text => row.try_get::<String, _>(idx).ok().map(Value::Text),
        TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).ok().map(Value::Bytes),
        TypeCategory::Unknown => None,
    };

    preferred
        .or_else(|| decode_integer(row, idx))
        .or_else(|| decode_float(row, idx))
        .or_else(|| row.try_get::<String, _>(idx).ok().map(Value::Text))
        .or_else(|| row.try_get::<Vec<u8>, _>(idx).ok().map(Value::Bytes))
        .or_else(|| row.try_get::<bool, _>(idx).ok().map(Value::Bool))
        .ok_or_else(|| {
            DbError::internal(format!(
                "Unsupported column type {} at index {}",
                type_name, idx
            ))
        })
}

fn decode_integer(row: &AnyRow, idx: usize) -> Option<Value> {
    row.try_get::<i64, _>(idx)
        .or_else(|_| row.try_get::<i32, _>(idx).map(i64::from))
        .or_else(|_| row.try_get::<i16, _>(idx).map(i64::from))
        .ok()
        .map(Value::Int)
}

fn decode_float(row: &AnyRow, idx: usize) -> Option<Value> {
    row.try_get::<f64, _>(idx)
        .or_else(|_| row.try_get::<f32, _>(idx).map(f64::from))
        .ok()
        .map(Value::Float)
}
