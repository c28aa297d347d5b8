//! Bundled driver implementations.
//!
//! - `any`: SQLite, PostgreSQL and MySQL through `sqlx::Any`
//! - `params`: argument binding for the sqlx driver
//! - `types`: row decoding for the sqlx driver

pub mod any;
mod params;
pub mod types;

pub use any::{SqlxConnection, SqlxDriver, SqlxRows, SqlxStatement, SqlxTransaction};
