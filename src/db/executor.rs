//! Statement execution over a checked-out connection.
//!
//! Connections that implement `Execer`/`Queryer` run statements directly.
//! Otherwise, or when the driver answers [`DbError::Skip`], the statement is
//! prepared, run and closed.

use crate::context::Context;
use crate::driver::{Connection, Rows, Statement};
use crate::error::{DbError, DbResult};
use crate::models::{ExecResult, NamedValue};
use tracing::debug;

/// Rows plus the statement they came from, when one had to be prepared.
pub(crate) type QueryOutput = (Box<dyn Rows>, Option<Box<dyn Statement>>);

/// Runs statements on one connection.
pub(crate) struct QueryExecutor<'c> {
    conn: &'c dyn Connection,
}

impl<'c> QueryExecutor<'c> {
    pub fn new(conn: &'c dyn Connection) -> Self {
        Self { conn }
    }

    pub async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<ExecResult> {
        if let Some(execer) = self.conn.as_execer() {
            match execer.exec(ctx, query, args).await {
                Err(DbError::Skip) => debug!("Driver skipped direct exec, preparing"),
                result => return result,
            }
        }

        let stmt = self.conn.prepare(ctx, query).await?;
        let result = match check_arg_count(stmt.as_ref(), args) {
            Ok(()) => stmt.exec(ctx, args).await,
            Err(err) => Err(err),
        };
        close_statement(stmt).await;
        result
    }

    pub(crate) async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<QueryOutput> {
        if let Some(queryer) = self.conn.as_queryer() {
            match queryer.query(ctx, query, args).await {
                Err(DbError::Skip) => debug!("Driver skipped direct query, preparing"),
                result => return result.map(|rows| (rows, None)),
            }
        }

        let stmt = self.conn.prepare(ctx, query).await?;
        let result = match check_arg_count(stmt.as_ref(), args) {
            Ok(()) => stmt.query(ctx, args).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(rows) => Ok((rows, Some(stmt))),
            Err(err) => {
                close_statement(stmt).await;
                Err(err)
            }
        }
    }
}

/// Reject argument lists that do not match the statement's placeholders.
pub(crate) fn check_arg_count(stmt: &dyn Statement, args: &[NamedValue]) -> DbResult<()> {
    match stmt.num_input() {
        Some(expected) if expected != args.len() => Err(DbError::invalid_input(format!(
            "expected {} arguments, got {}",
            expected,
            args.len()
        ))),
        _ => Ok(()),
    }
}

/// Close a statement whose close result has no caller to report to.
pub(crate) async fn close_statement(stmt: Box<dyn Statement>) {
    if let Err(err) = stmt.close().await {
        debug!(error = %err, "Error closing statement");
    }
}
