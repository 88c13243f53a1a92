//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the store.
//! - Materialize declared schemas before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections carry the requested schema version.

use super::migrations::{apply_schema, MigrationFn};
use super::DbResult;
use crate::schema::SchemaRegistry;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file and reconciles it with `registry`.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(
    path: impl AsRef<Path>,
    registry: &SchemaRegistry,
    version: u32,
    migration: Option<&MigrationFn>,
) -> DbResult<Connection> {
    open_with("file", || Connection::open(path), registry, version, migration)
}

/// Opens an in-memory SQLite database and materializes `registry`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory(
    registry: &SchemaRegistry,
    version: u32,
    migration: Option<&MigrationFn>,
) -> DbResult<Connection> {
    open_with(
        "memory",
        Connection::open_in_memory,
        registry,
        version,
        migration,
    )
}

fn open_with(
    mode: &str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
    registry: &SchemaRegistry,
    version: u32,
    migration: Option<&MigrationFn>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, registry, version, migration) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} version={} duration_ms={}",
                mode,
                version,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    registry: &SchemaRegistry,
    version: u32,
    migration: Option<&MigrationFn>,
) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_schema(conn, registry, version, migration)?;
    Ok(())
}
