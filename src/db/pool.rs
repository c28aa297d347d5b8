//! The client handle.
//!
//! [`Db`] owns at most one connection, opened lazily through its driver on
//! first use. Calls check the connection out for their duration, so they are
//! serialized; a transaction keeps it checked out until it finishes. Result
//! sets are read in full before the call returns. A connection the driver
//! reports invalid, or that failed with a bad-connection error, is closed and
//! replaced on the next call.

use crate::context::Context;
use crate::db::executor::QueryExecutor;
use crate::db::params::named_args;
use crate::db::{DbRows, DbStmt, DbTx};
use crate::driver::{Connection, Driver};
use crate::error::{DbError, DbResult};
use crate::models::{ExecResult, TxOptions, Value, mask_dsn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// An open driver connection and its bookkeeping.
pub(crate) struct Live {
    id: u64,
    conn: Box<dyn Connection>,
    needs_reset: bool,
}

impl Live {
    fn is_valid(&self) -> bool {
        self.conn
            .as_validator()
            .is_none_or(|validator| validator.is_valid())
    }
}

type Slot = Option<Live>;

/// Close and drop the connection in `slot`, if any.
async fn discard(slot: &mut Slot) {
    if let Some(live) = slot.take() {
        if let Err(err) = live.conn.close().await {
            debug!(connection = live.id, error = %err, "Error closing discarded connection");
        }
    }
}

/// Make the connection in `slot` ready for another call.
///
/// Invalid connections are discarded; a connection used before gets its
/// session reset when the driver supports it.
async fn recycle(slot: &mut Slot, ctx: &Context) -> DbResult<()> {
    let Some(live) = slot.as_mut() else {
        return Ok(());
    };
    if !live.is_valid() {
        debug!(connection = live.id, "Discarding invalid connection");
        discard(slot).await;
        return Ok(());
    }
    if !std::mem::take(&mut live.needs_reset) {
        return Ok(());
    }
    let Some(resetter) = live.conn.as_session_resetter() else {
        return Ok(());
    };
    let result = resetter.reset_session(ctx).await;
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_bad_connection() => {
            debug!(error = %err, "Session reset reported a bad connection");
            discard(slot).await;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Exclusive use of the connection for the lifetime of the guard.
pub(crate) struct ConnGuard {
    slot: OwnedMutexGuard<Slot>,
}

impl ConnGuard {
    pub(crate) fn conn(&self) -> DbResult<&dyn Connection> {
        (*self.slot)
            .as_ref()
            .map(|live| live.conn.as_ref())
            .ok_or(DbError::BadConnection)
    }

    /// Identifier of the checked-out connection; changes when it is replaced.
    pub(crate) fn id(&self) -> Option<u64> {
        (*self.slot).as_ref().map(|live| live.id)
    }

    /// Pass `result` through, discarding the connection when it failed with
    /// a bad-connection error.
    pub(crate) async fn settle<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        if let Err(err) = &result {
            self.check(err).await;
        }
        result
    }

    /// Discard the connection if `err` says it is broken.
    pub(crate) async fn check(&mut self, err: &DbError) {
        if err.is_bad_connection() {
            warn!(connection = ?self.id(), error = %err, "Discarding bad connection");
            discard(&mut self.slot).await;
        }
    }
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        if let Some(live) = (*self.slot).as_mut() {
            live.needs_reset = true;
        }
    }
}

/// Database handle over one driver and data source name.
pub struct Db {
    driver: Arc<dyn Driver>,
    dsn: String,
    slot: Arc<Mutex<Slot>>,
    opened: AtomicU64,
    closed: AtomicBool,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("driver", &self.driver.name())
            .field("dsn", &mask_dsn(&self.dsn))
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl Db {
    /// Create a handle over `driver`. No connection is opened until first use.
    pub fn with_driver(driver: Arc<dyn Driver>, dsn: impl Into<String>) -> Self {
        Self {
            driver,
            dsn: dsn.into(),
            slot: Arc::new(Mutex::new(None)),
            opened: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Check the connection out, opening or replacing it as needed.
    pub(crate) async fn acquire(&self, ctx: &Context) -> DbResult<ConnGuard> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        let mut slot = Arc::clone(&self.slot).lock_owned().await;
        if self.is_closed() {
            return Err(DbError::Closed);
        }

        recycle(&mut slot, ctx).await?;
        if slot.is_none() {
            let conn = self.driver.open(ctx, &self.dsn).await?;
            let id = self.opened.fetch_add(1, Ordering::AcqRel) + 1;
            debug!(
                driver = %self.driver.name(),
                dsn = %mask_dsn(&self.dsn),
                connection = id,
                "Opened connection"
            );
            *slot = Some(Live {
                id,
                conn,
                needs_reset: false,
            });
        }
        Ok(ConnGuard { slot })
    }

    /// Verify the database is reachable, opening the connection if needed.
    pub async fn ping(&self, ctx: &Context) -> DbResult<()> {
        let mut guard = self.acquire(ctx).await?;
        let result = match guard.conn()?.as_pinger() {
            Some(pinger) => pinger.ping(ctx).await,
            None => Ok(()),
        };
        guard.settle(result).await
    }

    /// Execute a statement that returns no rows.
    pub async fn exec(&self, ctx: &Context, query: &str, args: &[Value]) -> DbResult<ExecResult> {
        let args = named_args(args);
        let mut guard = self.acquire(ctx).await?;
        let result = QueryExecutor::new(guard.conn()?)
            .exec(ctx, query, &args)
            .await;
        guard.settle(result).await
    }

    /// Run a query. The rows are read before it returns, so the connection
    /// is free again while the caller iterates them.
    pub async fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> DbResult<DbRows> {
        let args = named_args(args);
        let mut guard = self.acquire(ctx).await?;
        let result = QueryExecutor::new(guard.conn()?)
            .query(ctx, query, &args)
            .await;
        let (rows, stmt) = guard.settle(result).await?;
        let rows = DbRows::fetch(rows, stmt).await;
        if let Some(err) = rows.failure() {
            guard.check(err).await;
        }
        Ok(rows)
    }

    /// Prepare a statement for repeated use.
    pub async fn prepare(&self, ctx: &Context, query: &str) -> DbResult<DbStmt<'_>> {
        let mut guard = self.acquire(ctx).await?;
        let result = guard.conn()?.prepare(ctx, query).await;
        let stmt = guard.settle(result).await?;
        Ok(DbStmt::for_db(self, query, stmt, guard.id()))
    }

    /// Start a transaction. The connection is held until it finishes.
    pub async fn begin(&self, ctx: &Context, opts: TxOptions) -> DbResult<DbTx> {
        let mut guard = self.acquire(ctx).await?;
        let result = guard.conn()?.begin(ctx, opts).await;
        let tx = guard.settle(result).await?;
        Ok(DbTx::new(tx, guard))
    }

    /// Close the connection. Later calls fail with [`DbError::Closed`];
    /// closing twice is a no-op.
    pub async fn close(&self) -> DbResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let live = self.slot.lock().await.take();
        match live {
            Some(live) => {
                debug!(connection = live.id, "Closing connection");
                live.conn.close().await
            }
            None => Ok(()),
        }
    }
}
