//! Client handle over a driver.
//!
//! This module provides the caller-facing API:
//! - `Db`: lazily connected handle with exec/query/prepare/begin/ping/close
//! - `DbTx`: transaction holding the connection until it finishes
//! - `DbStmt`: prepared statement
//! - `DbRows`: result set
//!
//! Statement execution prefers the connection's direct exec/query support and
//! falls back to prepare + execute.

pub(crate) mod executor;
pub(crate) mod params;
pub mod pool;
pub mod rows;
pub mod statement;
pub mod transaction;

pub use pool::Db;
pub use rows::DbRows;
pub use statement::DbStmt;
pub use transaction::DbTx;
