use super::{COMMIT, Instrument, ROLLBACK};
use crate::context::Context;
use crate::driver::Transaction;
use crate::error::DbResult;
use async_trait::async_trait;

/// Transaction decorator.
///
/// Commit and rollback take no context, so their records carry the context
/// the transaction was begun with.
pub struct LoggedTx {
    inner: Box<dyn Transaction>,
    ctx: Context,
    instrument: Instrument,
}

impl LoggedTx {
    pub fn new(inner: Box<dyn Transaction>, ctx: Context, instrument: Instrument) -> Self {
        Self {
            inner,
            ctx,
            instrument,
        }
    }
}

#[async_trait]
impl Transaction for LoggedTx {
    async fn commit(&self) -> DbResult<()> {
        self.instrument
            .observe(&self.ctx, COMMIT, None, None, self.inner.commit())
            .await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.instrument
            .observe(&self.ctx, ROLLBACK, None, None, self.inner.rollback())
            .await
    }
}
