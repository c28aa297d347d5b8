//! Data models for sqlogger.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{DatabaseType, mask_dsn};
pub use query::{ExecResult, IsolationLevel, NamedValue, TxOptions, Value};
