//! Query-related data models.
//!
//! This module defines bound argument values, execution results and
//! transaction options shared by drivers and the client handle.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bound argument or decoded column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl Value {
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
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{:?}", v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// An argument as handed to a driver: value plus its position and optional name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: Option<String>,
    /// 1-based position of the argument.
    pub ordinal: usize,
    pub value: Value,
}

impl NamedValue {
    pub fn new(ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: None,
            ordinal,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            ordinal,
            value: value.into(),
        }
    }
}

impl fmt::Display for NamedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}={}", name, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// Outcome of a statement that returns no rows.
///
/// Drivers report what they know; the accessors fail with
/// [`DbError::NotSupported`] for anything the driver left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    rows_affected: Option<u64>,
    last_insert_id: Option<i64>,
}

impl ExecResult {
    pub fn new(rows_affected: Option<u64>, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    pub fn rows_affected(&self) -> DbResult<u64> {
        self.rows_affected
            .ok_or_else(|| DbError::not_supported("rows_affected"))
    }

    pub fn last_insert_id(&self) -> DbResult<i64> {
        self.last_insert_id
            .ok_or_else(|| DbError::not_supported("last_insert_id"))
    }
}

/// Transaction isolation level. `Default` leaves the choice to the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling, `None` for the database default.
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::ReadUncommitted => Some("READ UNCOMMITTED"),
            Self::ReadCommitted => Some("READ COMMITTED"),
            Self::RepeatableRead => Some("REPEATABLE READ"),
            Self::Serializable => Some("SERIALIZABLE"),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql().unwrap_or("DEFAULT"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    #[serde(default)]
    pub isolation: IsolationLevel,
    #[serde(default)]
    pub read_only: bool,
}

impl TxOptions {
    pub fn read_only() -> Self {
        Self {
            isolation: IsolationLevel::Default,
            read_only: true,
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// True when neither isolation nor access mode deviate from the defaults.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
