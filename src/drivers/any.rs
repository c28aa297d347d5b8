//! Driver backed by `sqlx::AnyConnection`.
//!
//! One driver instance per backend; every connection is a single
//! `AnyConnection` shared by the statements and transactions created from it.
//! Calls observe the caller's [`Context`]: a finished context fails the call
//! before it touches the connection, and a context finishing mid-call aborts it
//! and marks the connection invalid.

use crate::context::Context;
use crate::driver::{
    Connection, Driver, Execer, Pinger, Queryer, Rows, RowsColumnTypes, Statement, Transaction,
    Validator,
};
use crate::drivers::params::bind_args;
use crate::drivers::types::decode_row;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, ExecResult, NamedValue, TxOptions, Value};
use async_trait::async_trait;
use sqlx::AnyConnection;
use sqlx::{Column as _, Connection as _, Either, Executor as _, Statement as _, TypeInfo as _};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

type SharedConn = Arc<Mutex<Option<AnyConnection>>>;

#[derive(Debug, Clone)]
pub struct SqlxDriver {
    db_type: DatabaseType,
}

impl SqlxDriver {
    pub fn new(db_type: DatabaseType) -> Self {
        sqlx::any::install_default_drivers();
        Self { db_type }
    }

    pub fn sqlite() -> Self {
        Self::new(DatabaseType::SQLite)
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Turn a data source name into a sqlx connection URL.
    ///
    /// SQLite accepts bare paths and `:memory:`; the networked backends need a
    /// URL whose scheme matches the driver.
    pub fn connection_url(&self, dsn: &str) -> DbResult<String> {
        match (self.db_type, DatabaseType::from_connection_string(dsn)) {
            (expected, Some(actual)) if expected == actual => Ok(dsn.to_string()),
            (DatabaseType::SQLite, None) => Ok(format!("sqlite:{}", dsn)),
            (expected, _) => Err(DbError::connection(
                format!("Data source is not a {} connection string", expected),
                format!(
                    "Use a {}:// connection string with the {} driver",
                    expected.driver_name(),
                    expected.driver_name()
                ),
            )),
        }
    }
}

#[async_trait]
impl Driver for SqlxDriver {
    fn name(&self) -> &str {
        self.db_type.driver_name()
    }

    async fn open(&self, ctx: &Context, dsn: &str) -> DbResult<Box<dyn Connection>> {
        let url = self.connection_url(dsn)?;
        let conn = ctx
            .run(async { AnyConnection::connect(&url).await.map_err(DbError::from) })
            .await?;
        debug!(db_type = %self.db_type, "Opened sqlx connection");
        Ok(Box::new(SqlxConnection {
            conn: Arc::new(Mutex::new(Some(conn))),
            valid: Arc::new(AtomicBool::new(true)),
            db_type: self.db_type,
        }))
    }
}

/// Run `fut` under `ctx`, invalidating the connection when the call is
/// aborted midway or the connection reports itself broken.
async fn guarded<T, F>(valid: &AtomicBool, ctx: &Context, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    if let Some(err) = ctx.err() {
        return Err(err);
    }
    let result = ctx.run(fut).await;
    if let Err(err) = &result {
        if err.is_cancellation() || err.is_bad_connection() {
            valid.store(false, Ordering::Release);
        }
    }
    result
}

fn live(slot: &mut Option<AnyConnection>) -> DbResult<&mut AnyConnection> {
    slot.as_mut().ok_or(DbError::BadConnection)
}

fn parameter_count<'q, S: sqlx::Statement<'q>>(stmt: &S) -> Option<usize> {
    stmt.parameters().map(|params| match params {
        Either::Left(types) => types.len(),
        Either::Right(count) => count,
    })
}

async fn exec_on(
    shared: &Mutex<Option<AnyConnection>>,
    query: &str,
    args: &[NamedValue],
) -> DbResult<ExecResult> {
    let mut slot = shared.lock().await;
    let conn = live(&mut slot)?;
    let result = bind_args(sqlx::query(query), args)
        .execute(&mut *conn)
        .await?;
    Ok(ExecResult::new(
        Some(result.rows_affected()),
        result.last_insert_id(),
    ))
}

async fn query_on(
    shared: &Mutex<Option<AnyConnection>>,
    query: &str,
    args: &[NamedValue],
) -> DbResult<SqlxRows> {
    let mut slot = shared.lock().await;
    let conn = live(&mut slot)?;

    // Column metadata comes from the prepared statement so empty results keep it.
    let columns: Vec<(String, String)> = {
        let stmt = (&mut *conn).prepare(query).await?;
        stmt.columns()
            .iter()
            .map(|col| (col.name().to_string(), col.type_info().name().to_string()))
            .collect()
    };

    let rows = bind_args(sqlx::query(query), args)
        .fetch_all(&mut *conn)
        .await?;
    let rows = rows
        .iter()
        .map(decode_row)
        .collect::<DbResult<VecDeque<_>>>()?;
    Ok(SqlxRows::new(columns, rows))
}

/// Statements that open a transaction with `opts` on `db_type`.
pub fn begin_statements(db_type: DatabaseType, opts: TxOptions) -> DbResult<Vec<String>> {
    match db_type {
        DatabaseType::SQLite => {
            if opts.read_only {
                return Err(DbError::not_supported("read-only transactions on SQLite"));
            }
            match opts.isolation.as_sql() {
                None | Some("SERIALIZABLE") => Ok(vec!["BEGIN".to_string()]),
                Some(level) => Err(DbError::not_supported(format!(
                    "isolation level {} on SQLite",
                    level
                ))),
            }
        }
        DatabaseType::PostgreSQL => {
            let mut sql = "BEGIN".to_string();
            if let Some(level) = opts.isolation.as_sql() {
                sql.push_str(" ISOLATION LEVEL ");
                sql.push_str(level);
            }
            if opts.read_only {
                sql.push_str(" READ ONLY");
            }
            Ok(vec![sql])
        }
        DatabaseType::MySQL => {
            let mut statements = Vec::new();
            if let Some(level) = opts.isolation.as_sql() {
                statements.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level));
            }
            statements.push(if opts.read_only {
                "START TRANSACTION READ ONLY".to_string()
            } else {
                "START TRANSACTION".to_string()
            });
            Ok(statements)
        }
    }
}

pub struct SqlxConnection {
    conn: SharedConn,
    valid: Arc<AtomicBool>,
    db_type: DatabaseType,
}

#[async_trait]
impl Connection for SqlxConnection {
    async fn prepare(&self, ctx: &Context, query: &str) -> DbResult<Box<dyn Statement>> {
        let num_input = guarded(&self.valid, ctx, async {
            let mut slot = self.conn.lock().await;
            let conn = live(&mut slot)?;
            let stmt = (&mut *conn).prepare(query).await?;
            Ok(parameter_count(&stmt))
        })
        .await?;

        Ok(Box::new(SqlxStatement {
            conn: Arc::clone(&self.conn),
            valid: Arc::clone(&self.valid),
            query: query.to_string(),
            num_input,
        }))
    }

    async fn begin(&self, ctx: &Context, opts: TxOptions) -> DbResult<Box<dyn Transaction>> {
        let statements = begin_statements(self.db_type, opts)?;
        guarded(&self.valid, ctx, async {
            let mut slot = self.conn.lock().await;
            let conn = live(&mut slot)?;
            for sql in &statements {
                (&mut *conn).execute(sql.as_str()).await?;
            }
            Ok(())
        })
        .await?;

        Ok(Box::new(SqlxTransaction {
            conn: Arc::clone(&self.conn),
            valid: Arc::clone(&self.valid),
            done: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> DbResult<()> {
        self.valid.store(false, Ordering::Release);
        let conn = self.conn.lock().await.take();
        match conn {
            Some(conn) => conn.close().await.map_err(DbError::from),
            None => Ok(()),
        }
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        Some(self)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        Some(self)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        Some(self)
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        Some(self)
    }
}

#[async_trait]
impl Pinger for SqlxConnection {
    async fn ping(&self, ctx: &Context) -> DbResult<()> {
        guarded(&self.valid, ctx, async {
            let mut slot = self.conn.lock().await;
            live(&mut slot)?.ping().await.map_err(DbError::from)
        })
        .await
    }
}

#[async_trait]
impl Execer for SqlxConnection {
    async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<ExecResult> {
        guarded(&self.valid, ctx, exec_on(&self.conn, query, args)).await
    }
}

#[async_trait]
impl Queryer for SqlxConnection {
    async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn Rows>> {
        let rows = guarded(&self.valid, ctx, query_on(&self.conn, query, args)).await?;
        Ok(Box::new(rows))
    }
}

impl Validator for SqlxConnection {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }
}

pub struct SqlxStatement {
    conn: SharedConn,
    valid: Arc<AtomicBool>,
    query: String,
    num_input: Option<usize>,
}

#[async_trait]
impl Statement for SqlxStatement {
    fn num_input(&self) -> Option<usize> {
        self.num_input
    }

    async fn exec(&self, ctx: &Context, args: &[NamedValue]) -> DbResult<ExecResult> {
        guarded(&self.valid, ctx, exec_on(&self.conn, &self.query, args)).await
    }

    async fn query(&self, ctx: &Context, args: &[NamedValue]) -> DbResult<Box<dyn Rows>> {
        let rows = guarded(&self.valid, ctx, query_on(&self.conn, &self.query, args)).await?;
        Ok(Box::new(rows))
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }
}

pub struct SqlxTransaction {
    conn: SharedConn,
    valid: Arc<AtomicBool>,
    done: AtomicBool,
}

impl SqlxTransaction {
    async fn finish(&self, sql: &str) -> DbResult<()> {
        if self.done.swap(true, Ordering::AcqRel) {
            return Err(DbError::TxDone);
        }
        let mut slot = self.conn.lock().await;
        let conn = live(&mut slot)?;
        let result = (&mut *conn).execute(sql).await.map(|_| ()).map_err(DbError::from);
        if let Err(err) = &result {
            if err.is_bad_connection() {
                self.valid.store(false, Ordering::Release);
            }
        }
        result
    }
}

#[async_trait]
impl Transaction for SqlxTransaction {
    async fn commit(&self) -> DbResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.finish("ROLLBACK").await
    }
}

/// Fully fetched result set.
#[derive(Debug)]
pub struct SqlxRows {
    columns: Vec<String>,
    type_names: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    closed: bool,
}

impl SqlxRows {
    fn new(columns: Vec<(String, String)>, rows: VecDeque<Vec<Value>>) -> Self {
        let (columns, type_names) = columns.into_iter().unzip();
        Self {
            columns,
            type_names,
            rows,
            closed: false,
        }
    }
}

#[async_trait]
impl Rows for SqlxRows {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    async fn next(&mut self) -> DbResult<Option<Vec<Value>>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }

    fn as_column_types(&self) -> Option<&dyn RowsColumnTypes> {
        Some(self)
    }
}

impl RowsColumnTypes for SqlxRows {
    fn column_type_database_type_name(&self, index: usize) -> Option<String> {
        self.type_names.get(index).cloned()
    }
}
