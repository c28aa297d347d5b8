//! Prepared statements on the client handle.

use crate::context::Context;
use crate::db::executor::{check_arg_count, close_statement};
use crate::db::params::named_args;
use crate::db::pool::ConnGuard;
use crate::db::{Db, DbRows, DbTx};
use crate::driver::{Rows, Statement};
use crate::error::{DbError, DbResult};
use crate::models::{ExecResult, NamedValue, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

enum Owner<'a> {
    /// Runs on the handle's connection, re-preparing when it was replaced.
    Db(&'a Db),
    /// Runs on the transaction's connection.
    Tx(&'a DbTx),
}

struct Prepared {
    stmt: Option<Box<dyn Statement>>,
    connection: Option<u64>,
}

/// A prepared statement.
pub struct DbStmt<'a> {
    owner: Owner<'a>,
    query: String,
    num_input: Option<usize>,
    prepared: Mutex<Prepared>,
    closed: AtomicBool,
}

impl<'a> DbStmt<'a> {
    pub(crate) fn for_db(
        db: &'a Db,
        query: &str,
        stmt: Box<dyn Statement>,
        connection: Option<u64>,
    ) -> Self {
        Self::new(Owner::Db(db), query, stmt, connection)
    }

    pub(crate) fn for_tx(tx: &'a DbTx, query: &str, stmt: Box<dyn Statement>) -> Self {
        Self::new(Owner::Tx(tx), query, stmt, None)
    }

    fn new(
        owner: Owner<'a>,
        query: &str,
        stmt: Box<dyn Statement>,
        connection: Option<u64>,
    ) -> Self {
        Self {
            owner,
            query: query.to_string(),
            num_input: stmt.num_input(),
            prepared: Mutex::new(Prepared {
                stmt: Some(stmt),
                connection,
            }),
            closed: AtomicBool::new(false),
        }
    }

    pub fn query_text(&self) -> &str {
        &self.query
    }

    /// Placeholder count reported by the driver at prepare time.
    pub fn num_input(&self) -> Option<usize> {
        self.num_input
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::invalid_input("statement is closed"));
        }
        Ok(())
    }

    /// Make sure the statement is prepared on the guard's connection.
    async fn prepared_on(
        &self,
        guard: &ConnGuard,
        ctx: &Context,
        prepared: &mut Prepared,
    ) -> DbResult<()> {
        if prepared.stmt.is_some() && prepared.connection == guard.id() {
            return Ok(());
        }
        if let Some(stale) = prepared.stmt.take() {
            debug!(query = %self.query, "Re-preparing statement on new connection");
            close_statement(stale).await;
        }
        prepared.stmt = Some(guard.conn()?.prepare(ctx, &self.query).await?);
        prepared.connection = guard.id();
        Ok(())
    }

    pub async fn exec(&self, ctx: &Context, args: &[Value]) -> DbResult<ExecResult> {
        self.ensure_open()?;
        let args = named_args(args);
        let mut prepared = self.prepared.lock().await;
        match self.owner {
            Owner::Db(db) => {
                let mut guard = db.acquire(ctx).await?;
                let ready = self.prepared_on(&guard, ctx, &mut prepared).await;
                let result = match ready {
                    Ok(()) => run_exec(&prepared, ctx, &args).await,
                    Err(err) => Err(err),
                };
                guard.settle(result).await
            }
            Owner::Tx(tx) => {
                tx.ensure_active()?;
                run_exec(&prepared, ctx, &args).await
            }
        }
    }

    pub async fn query(&self, ctx: &Context, args: &[Value]) -> DbResult<DbRows> {
        self.ensure_open()?;
        let args = named_args(args);
        let mut prepared = self.prepared.lock().await;
        match self.owner {
            Owner::Db(db) => {
                let mut guard = db.acquire(ctx).await?;
                let ready = self.prepared_on(&guard, ctx, &mut prepared).await;
                let result = match ready {
                    Ok(()) => run_query(&prepared, ctx, &args).await,
                    Err(err) => Err(err),
                };
                let rows = DbRows::fetch(guard.settle(result).await?, None).await;
                if let Some(err) = rows.failure() {
                    guard.check(err).await;
                }
                Ok(rows)
            }
            Owner::Tx(tx) => {
                tx.ensure_active()?;
                let rows = run_query(&prepared, ctx, &args).await?;
                Ok(DbRows::fetch(rows, None).await)
            }
        }
    }

    /// Close the statement. Closing twice is a no-op.
    pub async fn close(&self) -> DbResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let stmt = self.prepared.lock().await.stmt.take();
        match stmt {
            Some(stmt) => stmt.close().await,
            None => Ok(()),
        }
    }
}

async fn run_exec(
    prepared: &Prepared,
    ctx: &Context,
    args: &[NamedValue],
) -> DbResult<ExecResult> {
    let stmt = prepared.stmt.as_deref().ok_or(DbError::BadConnection)?;
    check_arg_count(stmt, args)?;
    stmt.exec(ctx, args).await
}

async fn run_query(
    prepared: &Prepared,
    ctx: &Context,
    args: &[NamedValue],
) -> DbResult<Box<dyn Rows>> {
    let stmt = prepared.stmt.as_deref().ok_or(DbError::BadConnection)?;
    check_arg_count(stmt, args)?;
    stmt.query(ctx, args).await
}

impl Drop for DbStmt<'_> {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let Some(stmt) = self.prepared.get_mut().stmt.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(close_statement(stmt));
        }
    }
}
