use super::{Instrument, STMT_CLOSE, STMT_EXEC, STMT_QUERY};
use crate::context::Context;
use crate::driver::{Rows, Statement};
use crate::error::DbResult;
use crate::models::{ExecResult, NamedValue};
use async_trait::async_trait;

/// Prepared statement decorator. Keeps the prepared text for its records.
pub struct LoggedStmt {
    inner: Box<dyn Statement>,
    query: String,
    instrument: Instrument,
}

impl LoggedStmt {
    pub fn new(
        inner: Box<dyn Statement>,
        query: impl Into<String>,
        instrument: Instrument,
    ) -> Self {
        Self {
            inner,
            query: query.into(),
            instrument,
        }
    }

    pub fn query_text(&self) -> &str {
        &self.query
    }
}

#[async_trait]
impl Statement for LoggedStmt {
    fn num_input(&self) -> Option<usize> {
        self.inner.num_input()
    }

    async fn exec(&self, ctx: &Context, args: &[NamedValue]) -> DbResult<ExecResult> {
        self.instrument
            .observe(
                ctx,
                STMT_EXEC,
                Some(&self.query),
                Some(args),
                self.inner.exec(ctx, args),
            )
            .await
    }

    async fn query(&self, ctx: &Context, args: &[NamedValue]) -> DbResult<Box<dyn Rows>> {
        self.instrument
            .observe(
                ctx,
                STMT_QUERY,
                Some(&self.query),
                Some(args),
                self.inner.query(ctx, args),
            )
            .await
    }

    async fn close(&self) -> DbResult<()> {
        self.instrument
            .observe(&Context::background(), STMT_CLOSE, None, None, self.inner.close())
            .await
    }
}
