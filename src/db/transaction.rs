//! Transactions on the client handle.

use crate::context::Context;
use crate::db::executor::QueryExecutor;
use crate::db::params::named_args;
use crate::db::pool::ConnGuard;
use crate::db::{DbRows, DbStmt};
use crate::driver::Transaction;
use crate::error::{DbError, DbResult};
use crate::models::{ExecResult, Value};
use std::fmt;
use tracing::{debug, warn};

/// An open transaction. Holds the connection until committed or rolled back.
///
/// Dropping an unfinished transaction rolls it back in the background.
pub struct DbTx {
    tx: Option<Box<dyn Transaction>>,
    guard: Option<ConnGuard>,
}

impl fmt::Debug for DbTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbTx")
            .field("connection", &self.guard.as_ref().and_then(|guard| guard.id()))
            .field("done", &self.tx.is_none())
            .finish()
    }
}

impl DbTx {
    pub(crate) fn new(tx: Box<dyn Transaction>, guard: ConnGuard) -> Self {
        Self {
            tx: Some(tx),
            guard: Some(guard),
        }
    }

    fn guard(&self) -> DbResult<&ConnGuard> {
        self.guard.as_ref().ok_or(DbError::TxDone)
    }

    pub(crate) fn ensure_active(&self) -> DbResult<()> {
        self.guard().map(|_| ())
    }

    pub async fn exec(&self, ctx: &Context, query: &str, args: &[Value]) -> DbResult<ExecResult> {
        let args = named_args(args);
        QueryExecutor::new(self.guard()?.conn()?)
            .exec(ctx, query, &args)
            .await
    }

    /// Run a query inside the transaction.
    pub async fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> DbResult<DbRows> {
        let args = named_args(args);
        let (rows, stmt) = QueryExecutor::new(self.guard()?.conn()?)
            .query(ctx, query, &args)
            .await?;
        Ok(DbRows::fetch(rows, stmt).await)
    }

    /// Prepare a statement bound to this transaction.
    pub async fn prepare(&self, ctx: &Context, query: &str) -> DbResult<DbStmt<'_>> {
        let stmt = self.guard()?.conn()?.prepare(ctx, query).await?;
        Ok(DbStmt::for_tx(self, query, stmt))
    }

    pub async fn commit(mut self) -> DbResult<()> {
        self.finish(true).await
    }

    pub async fn rollback(mut self) -> DbResult<()> {
        self.finish(false).await
    }

    async fn finish(&mut self, commit: bool) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::TxDone)?;
        let mut guard = self.guard.take().ok_or(DbError::TxDone)?;
        let result = if commit {
            tx.commit().await
        } else {
            tx.rollback().await
        };
        guard.settle(result).await
    }
}

impl Drop for DbTx {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let guard = self.guard.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Rolling back dropped transaction");
                handle.spawn(async move {
                    if let Err(err) = tx.rollback().await {
                        warn!(error = %err, "Rollback of dropped transaction failed");
                    }
                    drop(guard);
                });
            }
            Err(_) => warn!("Transaction dropped outside a runtime; not rolled back"),
        }
    }
}
