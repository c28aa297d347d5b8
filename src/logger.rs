//! Logger capability the instrumented wrappers emit through.
//!
//! The wrappers only know about [`Logger`]: one method taking a context, a
//! level, a message and borrowed key/value attributes. Any structured logging
//! backend can sit behind it. [`TracingLogger`] forwards records to `tracing`
//! and is what [`DEFAULT_LOGGER`] names.

use crate::context::Context;
use crate::error::DbError;
use crate::models::NamedValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const QUERY_KEY: &str = "query";
pub const ARGS_KEY: &str = "args";
pub const DURATION_KEY: &str = "duration";
pub const ERROR_KEY: &str = "error";

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            Level::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

/// Borrowed attribute value.
#[derive(Debug, Clone, Copy)]
pub enum AttrValue<'a> {
    Str(&'a str),
    Int(i64),
    Bool(bool),
    Duration(Duration),
    Args(&'a [NamedValue]),
    Error(&'a DbError),
}

impl fmt::Display for AttrValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Duration(d) => write!(f, "{:?}", d),
            AttrValue::Args(args) => {
                write!(f, "[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
            AttrValue::Error(err) => write!(f, "{}", err),
        }
    }
}

/// A key/value pair attached to a log record.
#[derive(Debug, Clone, Copy)]
pub struct Attr<'a> {
    pub key: &'a str,
    pub value: AttrValue<'a>,
}

impl<'a> Attr<'a> {
    pub fn new(key: &'a str, value: AttrValue<'a>) -> Self {
        Self { key, value }
    }

    pub fn string(key: &'a str, value: &'a str) -> Self {
        Self::new(key, AttrValue::Str(value))
    }

    pub fn int(key: &'a str, value: i64) -> Self {
        Self::new(key, AttrValue::Int(value))
    }

    pub fn query(query: &'a str) -> Self {
        Self::string(QUERY_KEY, query)
    }

    pub fn args(args: &'a [NamedValue]) -> Self {
        Self::new(ARGS_KEY, AttrValue::Args(args))
    }

    pub fn duration(duration: Duration) -> Self {
        Self::new(DURATION_KEY, AttrValue::Duration(duration))
    }

    pub fn error(err: &'a DbError) -> Self {
        Self::new(ERROR_KEY, AttrValue::Error(err))
    }
}

impl fmt::Display for Attr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Structured logging capability.
///
/// Implementations own formatting and output; failures to log are theirs to
/// handle and never reach the caller of the database operation.
pub trait Logger: Send + Sync {
    fn log_attrs(&self, ctx: &Context, level: Level, msg: &str, attrs: &[Attr<'_>]);
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn log_attrs(&self, ctx: &Context, level: Level, msg: &str, attrs: &[Attr<'_>]) {
        (**self).log_attrs(ctx, level, msg, attrs)
    }
}

/// Logger that emits `tracing` events under the `sqlogger` target.
///
/// Well-known attributes become event fields (`query`, `args`, `duration_us`,
/// `error`); any others are rendered into `attrs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub const fn new() -> Self {
        Self
    }
}

/// Logger used when the caller has no preference.
pub const DEFAULT_LOGGER: TracingLogger = TracingLogger::new();

/// [`DEFAULT_LOGGER`] as a shareable trait object.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(DEFAULT_LOGGER)
}

#[derive(Default)]
struct EventFields {
    query: Option<String>,
    args: Option<String>,
    duration_us: Option<u64>,
    error: Option<String>,
    extra: Vec<String>,
}

impl EventFields {
    fn collect(attrs: &[Attr<'_>]) -> Self {
        let mut fields = Self::default();
        for attr in attrs {
            match (attr.key, attr.value) {
                (QUERY_KEY, value) => fields.query = Some(value.to_string()),
                (ARGS_KEY, value) => fields.args = Some(value.to_string()),
                (DURATION_KEY, AttrValue::Duration(d)) => {
                    fields.duration_us = Some(u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
                }
                (ERROR_KEY, value) => fields.error = Some(value.to_string()),
                _ => fields.extra.push(attr.to_string()),
            }
        }
        fields
    }

    fn extra(&self) -> Option<String> {
        (!self.extra.is_empty()).then(|| self.extra.join(" "))
    }
}

macro_rules! emit_event {
    ($macro:ident, $fields:expr, $msg:expr) => {{
        let fields = $fields;
        let extra = fields.extra();
        tracing::$macro!(
            target: "sqlogger",
            query = fields.query.as_deref(),
            args = fields.args.as_deref(),
            duration_us = fields.duration_us,
            error = fields.error.as_deref(),
            attrs = extra.as_deref(),
            "{}",
            $msg
        )
    }};
}

impl Logger for TracingLogger {
    fn log_attrs(&self, _ctx: &Context, level: Level, msg: &str, attrs: &[Attr<'_>]) {
        let fields = EventFields::collect(attrs);
        match level {
            Level::Debug => emit_event!(debug, fields, msg),
            Level::Info => emit_event!(info, fields, msg),
            Level::Warn => emit_event!(warn, fields, msg),
            Level::Error => emit_event!(error, fields, msg),
        }
    }
}
