//! Shared test fixtures: a capturing logger and a scripted driver.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlogger::context::Context;
use sqlogger::driver::{
    Connection, Driver, Execer, Pinger, Queryer, Rows, RowsColumnTypes, SessionResetter,
    Statement, Transaction, Validator,
};
use sqlogger::error::{DbError, DbResult};
use sqlogger::logger::{ARGS_KEY, Attr, AttrValue, ERROR_KEY, Level, Logger, QUERY_KEY};
use sqlogger::models::{ExecResult, NamedValue, TxOptions, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Context key the capturing logger copies into its records.
pub const USER_ID_KEY: &str = "user_id";

/// One captured log record, with borrowed attributes turned into owned data.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub level: Level,
    pub msg: String,
    pub query: Option<String>,
    pub args: Option<Vec<NamedValue>>,
    pub duration: Option<Duration>,
    pub error: Option<DbError>,
    pub user_id: Option<JsonValue>,
}

#[derive(Default)]
pub struct CaptureLogger {
    records: Mutex<Vec<Record>>,
}

impl CaptureLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.msg).collect()
    }

    /// Records with the given message.
    pub fn find(&self, msg: &str) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| r.msg == msg)
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

impl Logger for CaptureLogger {
    fn log_attrs(&self, ctx: &Context, level: Level, msg: &str, attrs: &[Attr<'_>]) {
        let mut record = Record {
            level,
            msg: msg.to_string(),
            query: None,
            args: None,
            duration: None,
            error: None,
            user_id: ctx.value(USER_ID_KEY).cloned(),
        };
        for attr in attrs {
            match (attr.key, attr.value) {
                (QUERY_KEY, AttrValue::Str(q)) => record.query = Some(q.to_string()),
                (ARGS_KEY, AttrValue::Args(args)) => record.args = Some(args.to_vec()),
                (_, AttrValue::Duration(d)) => record.duration = Some(d),
                (ERROR_KEY, AttrValue::Error(err)) => record.error = Some(err.clone()),
                (key, value) => panic!("unexpected attribute {}={}", key, value),
            }
        }
        self.records.lock().unwrap().push(record);
    }
}

/// Behaviour of a [`MockDriver`].
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub pinger: bool,
    pub execer: bool,
    pub queryer: bool,
    pub resetter: bool,
    pub validator: bool,
    pub column_types: bool,
    pub open_error: Option<DbError>,
    pub exec_error: Option<DbError>,
    pub query_error: Option<DbError>,
    pub prepare_error: Option<DbError>,
    pub stmt_exec_error: Option<DbError>,
    pub commit_error: Option<DbError>,
    pub num_input: Option<usize>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            pinger: true,
            execer: true,
            queryer: true,
            resetter: false,
            validator: true,
            column_types: true,
            open_error: None,
            exec_error: None,
            query_error: None,
            prepare_error: None,
            stmt_exec_error: None,
            commit_error: None,
            num_input: None,
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Value::Int(1), Value::from("alice")],
                vec![Value::Int(2), Value::from("bob")],
            ],
        }
    }
}

impl MockConfig {
    /// A driver with only the core connection interface.
    pub fn bare() -> Self {
        Self {
            pinger: false,
            execer: false,
            queryer: false,
            resetter: false,
            validator: false,
            column_types: false,
            ..Self::default()
        }
    }
}

/// What the driver saw, shared between the test and every object it made.
#[derive(Debug, Default)]
pub struct MockState {
    calls: Mutex<Vec<String>>,
    pub opens: AtomicUsize,
    /// Validity reported by connections opened from now on and the current one.
    pub valid: AtomicBool,
}

impl MockState {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

pub struct MockDriver {
    config: MockConfig,
    state: Arc<MockState>,
}

impl MockDriver {
    pub fn new(config: MockConfig) -> Self {
        let state = MockState {
            valid: AtomicBool::new(true),
            ..MockState::default()
        };
        Self {
            config,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

fn check(ctx: &Context, scripted: &Option<DbError>) -> DbResult<()> {
    if let Some(err) = ctx.err() {
        return Err(err);
    }
    match scripted {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, ctx: &Context, dsn: &str) -> DbResult<Box<dyn Connection>> {
        self.state.record(format!("open:{}", dsn));
        check(ctx, &self.config.open_error)?;
        self.state.opens.fetch_add(1, Ordering::AcqRel);
        self.state.valid.store(true, Ordering::Release);
        Ok(Box::new(MockConn {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct MockConn {
    config: MockConfig,
    state: Arc<MockState>,
}

impl MockConn {
    fn rows(&self) -> Box<dyn Rows> {
        Box::new(MockRows {
            columns: self.config.columns.clone(),
            rows: self.config.rows.clone().into(),
            column_types: self.config.column_types,
        })
    }
}

#[async_trait]
impl Connection for MockConn {
    async fn prepare(&self, ctx: &Context, query: &str) -> DbResult<Box<dyn Statement>> {
        self.state.record(format!("prepare:{}", query));
        check(ctx, &self.config.prepare_error)?;
        Ok(Box::new(MockStmt {
            query: query.to_string(),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn begin(&self, ctx: &Context, _opts: TxOptions) -> DbResult<Box<dyn Transaction>> {
        self.state.record("begin");
        check(ctx, &None)?;
        Ok(Box::new(MockTx {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> DbResult<()> {
        self.state.record("close");
        Ok(())
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        self.config.pinger.then_some(self as &dyn Pinger)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        self.config.execer.then_some(self as &dyn Execer)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        self.config.queryer.then_some(self as &dyn Queryer)
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        self.config.resetter.then_some(self as &dyn SessionResetter)
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        self.config.validator.then_some(self as &dyn Validator)
    }
}

#[async_trait]
impl Pinger for MockConn {
    async fn ping(&self, ctx: &Context) -> DbResult<()> {
        self.state.record("ping");
        check(ctx, &None)
    }
}

#[async_trait]
impl Execer for MockConn {
    async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        _args: &[NamedValue],
    ) -> DbResult<ExecResult> {
        self.state.record(format!("exec:{}", query));
        check(ctx, &self.config.exec_error)?;
        Ok(ExecResult::new(Some(1), Some(7)))
    }
}

#[async_trait]
impl Queryer for MockConn {
    async fn query(
        &self,
        ctx: &Context,
        query: &str,
        _args: &[NamedValue],
    ) -> DbResult<Box<dyn Rows>> {
        self.state.record(format!("query:{}", query));
        check(ctx, &self.config.query_error)?;
        Ok(self.rows())
    }
}

#[async_trait]
impl SessionResetter for MockConn {
    async fn reset_session(&self, ctx: &Context) -> DbResult<()> {
        self.state.record("reset");
        check(ctx, &None)
    }
}

impl Validator for MockConn {
    fn is_valid(&self) -> bool {
        self.state.valid.load(Ordering::Acquire)
    }
}

pub struct MockStmt {
    query: String,
    config: MockConfig,
    state: Arc<MockState>,
}

#[async_trait]
impl Statement for MockStmt {
    fn num_input(&self) -> Option<usize> {
        self.config.num_input
    }

    async fn exec(&self, ctx: &Context, _args: &[NamedValue]) -> DbResult<ExecResult> {
        self.state.record(format!("stmt_exec:{}", self.query));
        check(ctx, &self.config.stmt_exec_error)?;
        Ok(ExecResult::new(Some(1), None))
    }

    async fn query(&self, ctx: &Context, _args: &[NamedValue]) -> DbResult<Box<dyn Rows>> {
        self.state.record(format!("stmt_query:{}", self.query));
        check(ctx, &None)?;
        Ok(Box::new(MockRows {
            columns: self.config.columns.clone(),
            rows: self.config.rows.clone().into(),
            column_types: self.config.column_types,
        }))
    }

    async fn close(&self) -> DbResult<()> {
        self.state.record(format!("stmt_close:{}", self.query));
        Ok(())
    }
}

pub struct MockTx {
    config: MockConfig,
    state: Arc<MockState>,
}

#[async_trait]
impl Transaction for MockTx {
    async fn commit(&self) -> DbResult<()> {
        self.state.record("commit");
        match &self.config.commit_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn rollback(&self) -> DbResult<()> {
        self.state.record("rollback");
        Ok(())
    }
}

pub struct MockRows {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    column_types: bool,
}

#[async_trait]
impl Rows for MockRows {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    async fn next(&mut self) -> DbResult<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.rows.clear();
        Ok(())
    }

    fn as_column_types(&self) -> Option<&dyn RowsColumnTypes> {
        self.column_types.then_some(self as &dyn RowsColumnTypes)
    }
}

impl RowsColumnTypes for MockRows {
    fn column_type_database_type_name(&self, index: usize) -> Option<String> {
        ["INTEGER", "TEXT"].get(index).map(|t| t.to_string())
    }
}

/// Wait until `cond` holds, polling the runtime between checks.
pub async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
