//! Schema-checked transactional record store over embedded SQLite.
//!
//! Every operation is checked against the record types declared at setup
//! and every mutation runs in its own write transaction.

pub mod db;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;

pub use db::{DbError, DbResult, MigrationFn};
pub use error::{ErrorCallback, ErrorKind, ErrorSink, StoreError, StoreResult};
pub use filter::{convert_filter, convert_filter_for, FilterSpec};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::record::{Record, RowId};
pub use repo::record_repo::{RecordRepository, SqliteRecordRepository};
pub use schema::{PropertyKind, PropertySpec, SchemaDefinition, SchemaRegistry};
pub use service::store::{Store, StoreLocation, StoreOptions, DEFAULT_SCHEMA_VERSION};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
