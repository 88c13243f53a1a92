//! Store-level error taxonomy and the uncaught-error side channel.
//!
//! # Responsibility
//! - Tag every facade failure with a kind callers can branch on.
//! - Notify the configured callback (or the log) before a failure returns.
//!
//! # Invariants
//! - The sink only observes errors; it never swallows or replaces them.

use crate::db::DbError;
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of one public store operation.
#[derive(Debug)]
pub enum StoreError {
    /// The type name was never registered at setup.
    SchemaNotFound(String),
    /// Opening or migrating the engine failed.
    Setup(DbError),
    /// The engine rejected a write transaction.
    Write(DbError),
    /// Filter translation or lookup failed.
    Query(DbError),
}

/// Stable discriminant of `StoreError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SchemaNotFound,
    Setup,
    Write,
    Query,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaNotFound(_) => ErrorKind::SchemaNotFound,
            Self::Setup(_) => ErrorKind::Setup,
            Self::Write(_) => ErrorKind::Write,
            Self::Query(_) => ErrorKind::Query,
        }
    }

    /// Returns the engine cause, if any.
    pub fn db_error(&self) -> Option<&DbError> {
        match self {
            Self::SchemaNotFound(_) => None,
            Self::Setup(err) | Self::Write(err) | Self::Query(err) => Some(err),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::SchemaNotFound(_) => "schema_not_found",
            Self::Setup(_) => "setup_failed",
            Self::Write(_) => "write_failed",
            Self::Query(_) => "query_failed",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchemaNotFound(name) => write!(f, "schema not found: {name}"),
            Self::Setup(err) => write!(f, "store setup failed: {err}"),
            Self::Write(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SchemaNotFound(_) => None,
            Self::Setup(err) | Self::Write(err) | Self::Query(err) => Some(err),
        }
    }
}

/// Callback invoked with every failure before it is returned.
pub type ErrorCallback = Arc<dyn Fn(&StoreError) + Send + Sync>;

/// Routes uncaught failures to a callback, or to the log when none is set.
#[derive(Clone, Default)]
pub struct ErrorSink {
    callback: Option<ErrorCallback>,
}

impl ErrorSink {
    pub fn new(callback: Option<ErrorCallback>) -> Self {
        Self { callback }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Notifies about `err` without consuming it.
    pub fn on_uncaught(&self, operation: &str, err: &StoreError) {
        match &self.callback {
            Some(callback) => callback(err),
            None => error!(
                "event={} module=store status=error error_code={} error={}",
                operation,
                err.code(),
                err
            ),
        }
    }

    /// Passes `result` through, notifying on the error path.
    pub fn observe<T>(&self, operation: &str, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            self.on_uncaught(operation, err);
        }
        result
    }
}

impl std::fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorSink")
            .field("has_callback", &self.has_callback())
            .finish()
    }
}
