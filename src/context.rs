//! Call context carried into every driver operation.
//!
//! A `Context` bundles a cancellation token, an optional deadline and a set of
//! request-scoped values. Drivers observe cancellation; the instrumented
//! wrappers only pass the context along (and hand it to the logger, which may
//! read values from it).

use crate::error::{DbError, DbResult};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<HashMap<String, JsonValue>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// An empty context that is never canceled.
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
            values: Arc::new(HashMap::new()),
        }
    }

    /// Derive a child context and the token that cancels it.
    ///
    /// Canceling the parent also cancels the child; canceling the returned
    /// token leaves the parent untouched.
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let token = self.cancel.child_token();
        let ctx = Self {
            cancel: token.clone(),
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        };
        (ctx, token)
    }

    /// Derive a child context that expires after `timeout`.
    /// An earlier deadline inherited from the parent is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
            values: Arc::clone(&self.values),
        }
    }

    /// Derive a child context carrying an additional value.
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            values: Arc::new(values),
        }
    }

    pub fn value(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The context error, once the context is done.
    pub fn err(&self) -> Option<DbError> {
        if self.cancel.is_cancelled() {
            return Some(DbError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DbError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves when the context is canceled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    /// Run `fut` unless the context finishes first.
    ///
    /// An already-finished context returns its error without polling `fut`.
    pub async fn run<F, T>(&self, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            _ = self.done() => Err(self.err().unwrap_or(DbError::Canceled)),
            result = fut => result,
        }
    }
}
