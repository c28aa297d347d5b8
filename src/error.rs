//! Error types for sqlogger.
//!
//! A single `thiserror` enum is shared by the driver contract, the instrumented
//! wrappers and the client handle. Errors are `Clone + PartialEq` so a caller can
//! check that what the wrapper returned is exactly what the driver produced.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Context canceled")]
    Canceled,

    #[error("Context deadline exceeded")]
    DeadlineExceeded,

    /// Returned by optional driver capabilities to request the fallback path.
    #[error("Driver: skip fast-path; continue as if unimplemented")]
    Skip,

    #[error("Driver: bad connection")]
    BadConnection,

    #[error("Unknown driver \"{name}\"")]
    UnknownDriver { name: String },

    #[error("Transaction has already been committed or rolled back")]
    TxDone,

    #[error("Database is closed")]
    Closed,

    #[error("Not supported: {operation}")]
    NotSupported { operation: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn unknown_driver(name: impl Into<String>) -> Self {
        Self::UnknownDriver { name: name.into() }
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Hint for the operator, when the failure has an obvious next step.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } | Self::Database { suggestion, .. } => {
                Some(suggestion)
            }
            Self::UnknownDriver { .. } => Some("Use one of: sqlite, sqlite3, postgres, mysql"),
            Self::DeadlineExceeded => Some("Raise the statement timeout"),
            Self::TxDone | Self::Closed => Some("Start a new transaction or reopen the database"),
            _ => None,
        }
    }

    /// SQLSTATE reported by the database, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// True for the two context errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// True when the connection that produced this error must not be reused.
    pub fn is_bad_connection(&self) -> bool {
        matches!(self, Self::BadConnection | Self::Connection { .. })
    }
}

/// Map a sqlx failure onto the driver contract.
///
/// Transport failures mean the connection is unusable and come back as
/// [`DbError::Connection`], so the client discards it.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::Database(db_err) => DbError::database(
                db_err.message(),
                db_err.code().map(|code| code.into_owned()),
                "Check the SQL syntax and referenced objects",
            ),
            E::Configuration(_) => DbError::connection(
                err.to_string(),
                "Check the data source name and credentials",
            ),
            E::Io(_) | E::Tls(_) | E::Protocol(_) | E::AnyDriverError(_) => {
                DbError::connection(err.to_string(), "Check that the database server is reachable")
            }
            E::WorkerCrashed => DbError::BadConnection,
            E::PoolTimedOut => DbError::DeadlineExceeded,
            E::PoolClosed => DbError::Closed,
            E::RowNotFound => DbError::database(err.to_string(), None, "No row matched the query"),
            E::ColumnNotFound(_)
            | E::ColumnIndexOutOfBounds { .. }
            | E::ColumnDecode { .. }
            | E::Decode(_) => DbError::internal(err.to_string()),
            other => DbError::internal(other.to_string()),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
