use super::{CONNECT, Instrument, LoggedConn};
use crate::context::Context;
use crate::driver::{Connection, Driver};
use crate::error::DbResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Driver decorator; connections it opens are [`LoggedConn`]s.
pub struct LoggedDriver {
    inner: Arc<dyn Driver>,
    instrument: Instrument,
}

impl LoggedDriver {
    pub fn new(inner: Arc<dyn Driver>, instrument: Instrument) -> Self {
        Self { inner, instrument }
    }

    pub fn inner(&self) -> &Arc<dyn Driver> {
        &self.inner
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }
}

#[async_trait]
impl Driver for LoggedDriver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn open(&self, ctx: &Context, dsn: &str) -> DbResult<Box<dyn Connection>> {
        let conn = self
            .instrument
            .observe(ctx, CONNECT, None, None, self.inner.open(ctx, dsn))
            .await?;
        Ok(Box::new(LoggedConn::new(conn, self.instrument.clone())))
    }
}
