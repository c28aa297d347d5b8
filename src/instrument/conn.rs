//! Connection decorator.
//!
//! Capability probes mirror the inner connection: `as_pinger` and friends
//! return the wrapper exactly when the wrapped connection has the capability.
//! Calling a capability method the inner connection lacks yields
//! [`DbError::Skip`] without a log record.

use super::{
    BEGIN, CLOSE, EXEC, Instrument, LoggedStmt, LoggedTx, PING, PREPARE, QUERY, RESET_SESSION,
};
use crate::context::Context;
use crate::driver::{
    Connection, Execer, Pinger, Queryer, Rows, SessionResetter, Statement, Transaction, Validator,
};
use crate::error::{DbError, DbResult};
use crate::models::{ExecResult, NamedValue, TxOptions};
use async_trait::async_trait;

pub struct LoggedConn {
    inner: Box<dyn Connection>,
    instrument: Instrument,
}

impl LoggedConn {
    pub fn new(inner: Box<dyn Connection>, instrument: Instrument) -> Self {
        Self { inner, instrument }
    }

    pub fn inner(&self) -> &dyn Connection {
        self.inner.as_ref()
    }
}

#[async_trait]
impl Connection for LoggedConn {
    async fn prepare(&self, ctx: &Context, query: &str) -> DbResult<Box<dyn Statement>> {
        let stmt = self
            .instrument
            .observe(ctx, PREPARE, Some(query), None, self.inner.prepare(ctx, query))
            .await?;
        Ok(Box::new(LoggedStmt::new(stmt, query, self.instrument.clone())))
    }

    async fn begin(&self, ctx: &Context, opts: TxOptions) -> DbResult<Box<dyn Transaction>> {
        let tx = self
            .instrument
            .observe(ctx, BEGIN, None, None, self.inner.begin(ctx, opts))
            .await?;
        Ok(Box::new(LoggedTx::new(tx, ctx.clone(), self.instrument.clone())))
    }

    async fn close(&self) -> DbResult<()> {
        self.instrument
            .observe(&Context::background(), CLOSE, None, None, self.inner.close())
            .await
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        self.inner.as_pinger().map(|_| self as &dyn Pinger)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        self.inner.as_execer().map(|_| self as &dyn Execer)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        self.inner.as_queryer().map(|_| self as &dyn Queryer)
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        self.inner
            .as_session_resetter()
            .map(|_| self as &dyn SessionResetter)
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        self.inner.as_validator().map(|_| self as &dyn Validator)
    }
}

#[async_trait]
impl Pinger for LoggedConn {
    async fn ping(&self, ctx: &Context) -> DbResult<()> {
        let Some(pinger) = self.inner.as_pinger() else {
            return Err(DbError::Skip);
        };
        self.instrument
            .observe(ctx, PING, None, None, pinger.ping(ctx))
            .await
    }
}

#[async_trait]
impl Execer for LoggedConn {
    async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<ExecResult> {
        let Some(execer) = self.inner.as_execer() else {
            return Err(DbError::Skip);
        };
        self.instrument
            .observe(ctx, EXEC, Some(query), Some(args), execer.exec(ctx, query, args))
            .await
    }
}

#[async_trait]
impl Queryer for LoggedConn {
    async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn Rows>> {
        let Some(queryer) = self.inner.as_queryer() else {
            return Err(DbError::Skip);
        };
        self.instrument
            .observe(ctx, QUERY, Some(query), Some(args), queryer.query(ctx, query, args))
            .await
    }
}

#[async_trait]
impl SessionResetter for LoggedConn {
    async fn reset_session(&self, ctx: &Context) -> DbResult<()> {
        let Some(resetter) = self.inner.as_session_resetter() else {
            return Err(DbError::Skip);
        };
        self.instrument
            .observe(ctx, RESET_SESSION, None, None, resetter.reset_session(ctx))
            .await
    }
}

impl Validator for LoggedConn {
    fn is_valid(&self) -> bool {
        self.inner
            .as_validator()
            .is_none_or(|validator| validator.is_valid())
    }
}
