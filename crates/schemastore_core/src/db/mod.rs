//! SQLite engine bootstrap and schema-version migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for a store.
//! - Materialize declared schemas as tables and run version migrations.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - No record is read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use migrations::{current_user_version, MigrationFn};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Engine-level failure.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        requested: u32,
    },
    MigrationRequired {
        schema: String,
        column: String,
    },
    Migration(String),
    InvalidSchema(String),
    UnknownProperty {
        schema: String,
        property: String,
    },
    InvalidValue {
        schema: String,
        property: String,
        message: String,
    },
    MissingPrimaryKey(String),
    NotAnObject(String),
    RecordNotFound {
        schema: String,
        row_id: i64,
    },
    InvalidData(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                requested,
            } => write!(
                f,
                "database schema version {db_version} is newer than requested {requested}"
            ),
            Self::MigrationRequired { schema, column } => write!(
                f,
                "migration required: column `{column}` of `{schema}` is missing; bump the schema version"
            ),
            Self::Migration(message) => write!(f, "migration failed: {message}"),
            Self::InvalidSchema(message) => write!(f, "invalid schema: {message}"),
            Self::UnknownProperty { schema, property } => {
                write!(f, "`{schema}` has no property `{property}`")
            }
            Self::InvalidValue {
                schema,
                property,
                message,
            } => write!(f, "invalid value for `{schema}.{property}`: {message}"),
            Self::MissingPrimaryKey(schema) => {
                write!(f, "merge update of `{schema}` needs a primary key value")
            }
            Self::NotAnObject(schema) => write!(f, "`{schema}` values must be JSON objects"),
            Self::RecordNotFound { schema, row_id } => {
                write!(f, "`{schema}` record {row_id} not found")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Quotes an identifier for use in SQL text.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
