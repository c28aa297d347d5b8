//! Result sets returned by the client handle.

use crate::db::executor::close_statement;
use crate::driver::{Rows, Statement};
use crate::error::{DbError, DbResult};
use crate::models::Value;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

/// A result set.
///
/// The driver's rows are read to the end when the query runs and the
/// connection is released before the caller sees the first row, so the
/// same handle can be used while iterating. A driver error hit while reading
/// is returned by [`DbRows::next`] after the rows read before it.
pub struct DbRows {
    columns: Vec<String>,
    column_types: Option<Vec<String>>,
    buffered: VecDeque<Vec<Value>>,
    failure: Option<DbError>,
    closed: bool,
}

impl fmt::Debug for DbRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbRows")
            .field("columns", &self.columns)
            .field("remaining", &self.buffered.len())
            .field("failure", &self.failure)
            .field("closed", &self.closed)
            .finish()
    }
}

impl DbRows {
    /// Drain `rows`, then close it and the statement it came from.
    pub(crate) async fn fetch(mut rows: Box<dyn Rows>, stmt: Option<Box<dyn Statement>>) -> Self {
        let columns = rows.columns();
        let column_types = rows.as_column_types().map(|types| {
            (0..columns.len())
                .map(|i| types.column_type_database_type_name(i).unwrap_or_default())
                .collect()
        });

        let mut buffered = VecDeque::new();
        let failure = loop {
            match rows.next().await {
                Ok(Some(row)) => buffered.push_back(row),
                Ok(None) => break None,
                Err(err) => break Some(err),
            }
        };
        if let Err(err) = rows.close().await {
            debug!(error = %err, "Error closing drained rows");
        }
        if let Some(stmt) = stmt {
            close_statement(stmt).await;
        }

        Self {
            columns,
            column_types,
            buffered,
            failure,
            closed: false,
        }
    }

    /// Error the driver reported while the rows were read, if any.
    pub(crate) fn failure(&self) -> Option<&DbError> {
        self.failure.as_ref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Database type name per column, when the driver reports them.
    pub fn column_types(&self) -> Option<Vec<String>> {
        self.column_types.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Next row, `None` once exhausted. Exhaustion closes the result set.
    pub async fn next(&mut self) -> DbResult<Option<Vec<Value>>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(row) = self.buffered.pop_front() {
            return Ok(Some(row));
        }
        self.closed = true;
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    /// Discard the remaining rows. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.buffered.clear();
        self.failure = None;
        self.closed = true;
    }

    /// Read every remaining row and close the result set.
    pub async fn collect_all(mut self) -> DbResult<Vec<Vec<Value>>> {
        let mut out = Vec::with_capacity(self.buffered.len());
        while let Some(row) = self.next().await? {
            out.push(row);
        }
        Ok(out)
    }
}
