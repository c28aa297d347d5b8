//! sqlogger
//!
//! A logging decorator for database drivers. Wrap any [`Driver`] and every
//! statement it runs is logged with its query text, arguments, duration and
//! error through a pluggable [`Logger`], while results and errors reach the
//! caller unchanged.
//!
//! ```no_run
//! # async fn demo() -> sqlogger::DbResult<()> {
//! use sqlogger::context::Context;
//!
//! let db = sqlogger::open("sqlite", ":memory:", sqlogger::default_logger(), None)?;
//! db.exec(&Context::background(), "CREATE TABLE user (id INT PRIMARY KEY, name TEXT)", &[])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod db;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod instrument;
pub mod logger;
pub mod models;

pub use config::{Config, Options};
pub use db::{Db, DbRows, DbStmt, DbTx};
pub use driver::{Driver, DriverRegistry};
pub use error::{DbError, DbResult};
pub use instrument::{LoggedDriver, new, open, open_with};
pub use logger::{DEFAULT_LOGGER, Logger, TracingLogger, default_logger};
