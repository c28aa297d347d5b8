//! Instrumented driver wrappers.
//!
//! [`LoggedDriver`] decorates any [`Driver`]; every object it hands out is
//! decorated in turn. Each wrapped call is timed, forwarded unchanged and
//! followed by exactly one log record:
//!
//! - `Info` on success, `Error` on failure
//! - `Debug` when the driver answers [`DbError::Skip`]
//!
//! Only the logged query text is ever normalized.

pub mod conn;
pub mod driver;
pub mod normalize;
pub mod stmt;
pub mod tx;

pub use conn::LoggedConn;
pub use driver::LoggedDriver;
pub use stmt::LoggedStmt;
pub use tx::LoggedTx;

use crate::config::Options;
use crate::context::Context;
use crate::db::Db;
use crate::driver::{Driver, DriverRegistry};
use crate::error::{DbError, DbResult};
use crate::logger::{Attr, Level, Logger};
use crate::models::NamedValue;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const CONNECT: &str = "Connect";
pub const PING: &str = "Ping";
pub const RESET_SESSION: &str = "ResetSession";
pub const CLOSE: &str = "Close";
pub const PREPARE: &str = "Prepare";
pub const BEGIN: &str = "Begin";
pub const COMMIT: &str = "Commit";
pub const ROLLBACK: &str = "Rollback";
pub const EXEC: &str = "Exec";
pub const QUERY: &str = "Query";
pub const STMT_EXEC: &str = "StmtExec";
pub const STMT_QUERY: &str = "StmtQuery";
pub const STMT_CLOSE: &str = "StmtClose";

/// Logger and options shared by every wrapper derived from one driver.
#[derive(Clone)]
pub struct Instrument {
    logger: Arc<dyn Logger>,
    options: Options,
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Instrument {
    pub fn new(logger: Arc<dyn Logger>, options: Options) -> Self {
        Self { logger, options }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// Severity for an operation outcome.
    pub fn level_for(err: Option<&DbError>) -> Level {
        match err {
            None => Level::Info,
            Some(DbError::Skip) => Level::Debug,
            Some(_) => Level::Error,
        }
    }

    /// Emit the record for one finished operation.
    ///
    /// `query` is the text the driver received; it is normalized here when
    /// the options ask for it.
    pub fn record(
        &self,
        ctx: &Context,
        msg: &str,
        elapsed: Duration,
        query: Option<&str>,
        args: Option<&[NamedValue]>,
        err: Option<&DbError>,
    ) {
        let query = query.map(|q| self.options.display_query(q));
        let mut attrs = Vec::with_capacity(4);
        if let Some(query) = query.as_deref() {
            attrs.push(Attr::query(query));
        }
        if let Some(args) = args {
            attrs.push(Attr::args(args));
        }
        attrs.push(Attr::duration(elapsed));
        if let Some(err) = err {
            attrs.push(Attr::error(err));
        }
        self.logger.log_attrs(ctx, Self::level_for(err), msg, &attrs);
    }

    /// Time `fut`, log its outcome and hand the result back untouched.
    pub(crate) async fn observe<T, F>(
        &self,
        ctx: &Context,
        msg: &str,
        query: Option<&str>,
        args: Option<&[NamedValue]>,
        fut: F,
    ) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.record(ctx, msg, start.elapsed(), query, args, result.as_ref().err());
        result
    }
}

/// Open a logging handle for a driver registered in the default registry.
///
/// An unknown driver name fails here and is not logged.
pub fn open(
    driver_name: &str,
    dsn: &str,
    logger: Arc<dyn Logger>,
    options: Option<Options>,
) -> DbResult<Db> {
    open_with(&DriverRegistry::with_defaults(), driver_name, dsn, logger, options)
}

/// Like [`open`], resolving `driver_name` in `registry`.
pub fn open_with(
    registry: &DriverRegistry,
    driver_name: &str,
    dsn: &str,
    logger: Arc<dyn Logger>,
    options: Option<Options>,
) -> DbResult<Db> {
    let driver = registry.get(driver_name)?;
    Ok(new(driver, dsn, logger, options))
}

/// Open a logging handle over `driver`. No connection is made until first use.
pub fn new(
    driver: Arc<dyn Driver>,
    dsn: &str,
    logger: Arc<dyn Logger>,
    options: Option<Options>,
) -> Db {
    let instrument = Instrument::new(logger, options.unwrap_or_default());
    Db::with_driver(Arc::new(LoggedDriver::new(driver, instrument)), dsn)
}
