//! Driver contract.
//!
//! A driver is split the usual way: [`Driver`] opens [`Connection`]s, which
//! prepare [`Statement`]s and begin [`Transaction`]s; queries yield [`Rows`].
//! Everything beyond that core is an optional capability a caller probes for
//! at runtime through the `as_*` methods, each returning `None` unless the
//! implementation overrides it.

pub mod registry;

pub use registry::DriverRegistry;

use crate::context::Context;
use crate::error::DbResult;
use crate::models::{ExecResult, NamedValue, TxOptions, Value};
use async_trait::async_trait;

#[async_trait]
pub trait Driver: Send + Sync {
    /// Name used for registration and diagnostics.
    fn name(&self) -> &str;

    /// Open a new connection to the database named by `dsn`.
    async fn open(&self, ctx: &Context, dsn: &str) -> DbResult<Box<dyn Connection>>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    async fn prepare(&self, ctx: &Context, query: &str) -> DbResult<Box<dyn Statement>>;

    async fn begin(&self, ctx: &Context, opts: TxOptions) -> DbResult<Box<dyn Transaction>>;

    /// Release the connection. Calls after close fail.
    async fn close(&self) -> DbResult<()>;

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        None
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        None
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        None
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        None
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }
}

/// Connection liveness check.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, ctx: &Context) -> DbResult<()>;
}

/// One-shot execution without an explicit prepare step.
///
/// May return [`DbError::Skip`](crate::error::DbError::Skip) to make the
/// caller fall back to prepare + execute.
#[async_trait]
pub trait Execer: Send + Sync {
    async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<ExecResult>;
}

/// One-shot query without an explicit prepare step.
#[async_trait]
pub trait Queryer: Send + Sync {
    async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn Rows>>;
}

/// Reset session state before a connection is reused.
#[async_trait]
pub trait SessionResetter: Send + Sync {
    async fn reset_session(&self, ctx: &Context) -> DbResult<()>;
}

/// Cheap, synchronous check that a connection may still be used.
pub trait Validator: Send + Sync {
    fn is_valid(&self) -> bool;
}

#[async_trait]
pub trait Statement: Send + Sync {
    /// Number of placeholders, `None` when the driver cannot tell.
    fn num_input(&self) -> Option<usize>;

    async fn exec(&self, ctx: &Context, args: &[NamedValue]) -> DbResult<ExecResult>;

    async fn query(&self, ctx: &Context, args: &[NamedValue]) -> DbResult<Box<dyn Rows>>;

    async fn close(&self) -> DbResult<()>;
}

#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(&self) -> DbResult<()>;

    async fn rollback(&self) -> DbResult<()>;
}

#[async_trait]
pub trait Rows: Send + Sync {
    fn columns(&self) -> Vec<String>;

    /// Next row, `None` once the result set is exhausted.
    async fn next(&mut self) -> DbResult<Option<Vec<Value>>>;

    async fn close(&mut self) -> DbResult<()>;

    fn as_column_types(&self) -> Option<&dyn RowsColumnTypes> {
        None
    }
}

/// Database type names of the result columns.
pub trait RowsColumnTypes: Send + Sync {
    fn column_type_database_type_name(&self, index: usize) -> Option<String>;
}
