//! Schema-checked CRUD facade over one SQLite engine handle.
//!
//! # Responsibility
//! - Own the engine connection opened at setup.
//! - Check every type name against the registry before touching the engine.
//! - Wrap each mutation in its own immediate write transaction.
//! - Report every failure through the error sink before returning it.
//!
//! # Invariants
//! - A failed mutation leaves no partial writes (the transaction rolls back).
//! - `remove_all(None)` commits one transaction per type; a later failure
//!   does not undo earlier types.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult, MigrationFn};
use crate::error::{ErrorCallback, ErrorSink, StoreError, StoreResult};
use crate::filter::{convert_filter, convert_filter_for, FilterSpec};
use crate::model::record::Record;
use crate::repo::record_repo::{RecordRepository, SqliteRecordRepository};
use crate::schema::{SchemaDefinition, SchemaRegistry};
use log::{debug, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Schema version used when the caller does not set one.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

/// Where the engine keeps its data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreLocation {
    #[default]
    Memory,
    File(PathBuf),
}

/// Setup parameters for `Store::setup`.
pub struct StoreOptions {
    schemas: Vec<SchemaDefinition>,
    schema_version: u32,
    migration: Option<MigrationFn>,
    error_callback: Option<ErrorCallback>,
    location: StoreLocation,
}

impl StoreOptions {
    /// In-memory store at version 1 with no migration and no error callback.
    pub fn new(schemas: Vec<SchemaDefinition>) -> Self {
        Self {
            schemas,
            schema_version: DEFAULT_SCHEMA_VERSION,
            migration: None,
            error_callback: None,
            location: StoreLocation::Memory,
        }
    }

    pub fn schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Routine run inside the upgrade transaction as `(conn, old, new)`.
    pub fn migration<F>(mut self, migration: F) -> Self
    where
        F: Fn(&Connection, u32, u32) -> DbResult<()> + Send + Sync + 'static,
    {
        self.migration = Some(Box::new(migration));
        self
    }

    /// Callback notified with every failed operation.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.error_callback = Some(Arc::new(callback));
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = StoreLocation::File(path.into());
        self
    }

    pub fn location(mut self, location: StoreLocation) -> Self {
        self.location = location;
        self
    }
}

/// Owned store handle: registry, engine connection and error sink.
pub struct Store {
    conn: Connection,
    registry: SchemaRegistry,
    sink: ErrorSink,
    schema_version: u32,
}

impl Store {
    /// Registers `options.schemas` and opens the engine with them.
    ///
    /// # Errors
    /// - `StoreError::Setup` for invalid schemas, open failures, version
    ///   conflicts or a failing migration routine.
    pub fn setup(options: StoreOptions) -> StoreResult<Self> {
        let StoreOptions {
            schemas,
            schema_version,
            migration,
            error_callback,
            location,
        } = options;
        let sink = ErrorSink::new(error_callback);

        let opened = SchemaRegistry::new(schemas).and_then(|registry| {
            let conn = match &location {
                StoreLocation::Memory => {
                    open_db_in_memory(&registry, schema_version, migration.as_ref())?
                }
                StoreLocation::File(path) => {
                    open_db(path, &registry, schema_version, migration.as_ref())?
                }
            };
            Ok((conn, registry))
        });
        let (conn, registry) = sink.observe("store_setup", opened.map_err(StoreError::Setup))?;

        info!(
            "event=store_setup module=store status=ok schemas={} version={}",
            registry.len(),
            schema_version
        );
        Ok(Self {
            conn,
            registry,
            sink,
            schema_version,
        })
    }

    /// Fails with `SchemaNotFound` when `type_name` was not registered.
    pub fn check_schema(&self, type_name: &str) -> StoreResult<()> {
        if self.registry.contains(type_name) {
            Ok(())
        } else {
            Err(StoreError::SchemaNotFound(type_name.to_string()))
        }
    }

    /// Registered type names in registration order.
    pub fn all_keys(&self) -> Vec<String> {
        self.registry.keys()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Creates one record of `type_name` inside a write transaction.
    ///
    /// A duplicate primary key fails with the engine's unique-constraint error.
    pub fn create_item(&mut self, type_name: &str, value: &Value) -> StoreResult<Record> {
        let Self {
            conn,
            registry,
            sink,
            ..
        } = self;
        let result = lookup(registry, type_name).and_then(|schema| {
            let fields = as_object(schema, value).map_err(StoreError::Write)?;
            in_write_tx(conn, |tx| SqliteRecordRepository::new(tx, schema).insert(fields))
                .map_err(StoreError::Write)
        });

        if let Ok(record) = &result {
            debug!(
                "event=item_create module=store status=ok schema={} row_id={}",
                record.schema, record.row_id
            );
        }
        sink.observe("item_create", result)
    }

    /// Creates or merges a record by primary key inside a write transaction.
    ///
    /// Fields absent from `value` keep their stored values.
    pub fn update_item(&mut self, type_name: &str, value: &Value) -> StoreResult<Record> {
        let Self {
            conn,
            registry,
            sink,
            ..
        } = self;
        let result = lookup(registry, type_name).and_then(|schema| {
            let fields = as_object(schema, value).map_err(StoreError::Write)?;
            in_write_tx(conn, |tx| SqliteRecordRepository::new(tx, schema).merge(fields))
                .map_err(StoreError::Write)
        });

        if let Ok(record) = &result {
            debug!(
                "event=item_update module=store status=ok schema={} row_id={}",
                record.schema, record.row_id
            );
        }
        sink.observe("item_update", result)
    }

    /// Deletes the row `record` was read from.
    pub fn delete_item(&mut self, record: &Record) -> StoreResult<()> {
        let Self {
            conn,
            registry,
            sink,
            ..
        } = self;
        let result = lookup(registry, &record.schema).and_then(|schema| {
            in_write_tx(conn, |tx| {
                SqliteRecordRepository::new(tx, schema).delete(record.row_id)
            })
            .map_err(StoreError::Write)
        });

        if result.is_ok() {
            debug!(
                "event=item_delete module=store status=ok schema={} row_id={}",
                record.schema, record.row_id
            );
        }
        sink.observe("item_delete", result)
    }

    /// Deletes every record of `type_name`, or of every registered type.
    ///
    /// Without a type name, each non-empty type is cleared in its own
    /// transaction, in registration order, stopping at the first failure.
    pub fn remove_all(&mut self, type_name: Option<&str>) -> StoreResult<()> {
        let Self {
            conn,
            registry,
            sink,
            ..
        } = self;
        let started_at = Instant::now();

        let result = match type_name {
            Some(name) => lookup(registry, name).and_then(|schema| clear_type(conn, schema)),
            None => registry
                .schemas()
                .iter()
                .try_fold(0_usize, |total, schema| -> StoreResult<usize> {
                    let pending = SqliteRecordRepository::new(conn, schema)
                        .count()
                        .map_err(StoreError::Write)?;
                    if pending == 0 {
                        return Ok(total);
                    }
                    Ok(total + clear_type(conn, schema)?)
                }),
        };

        if let Ok(removed) = &result {
            info!(
                "event=items_remove_all module=store status=ok scope={} removed={} duration_ms={}",
                type_name.unwrap_or("*"),
                removed,
                started_at.elapsed().as_millis()
            );
        }
        sink.observe("items_remove_all", result.map(|_| ()))
    }

    /// Returns all records of `type_name`, or those matching `filter`.
    ///
    /// Records come back in insertion order. An empty predicate selects all.
    pub fn get_items(
        &self,
        type_name: &str,
        filter: Option<&FilterSpec>,
    ) -> StoreResult<Vec<Record>> {
        let result = lookup(&self.registry, type_name).and_then(|schema| {
            let predicate = filter.map(|filter| convert_filter_for(filter, schema));
            SqliteRecordRepository::new(&self.conn, schema)
                .list(predicate.as_deref())
                .map_err(StoreError::Query)
        });
        self.sink.observe("items_get", result)
    }

    /// Looks up one record by primary-key value.
    pub fn find_by_primary_key(
        &self,
        type_name: &str,
        key: &Value,
    ) -> StoreResult<Option<Record>> {
        let result = lookup(&self.registry, type_name).and_then(|schema| {
            if self.registry.primary_key_of(type_name).is_none() {
                return Err(StoreError::Query(DbError::MissingPrimaryKey(
                    schema.name.clone(),
                )));
            }
            SqliteRecordRepository::new(&self.conn, schema)
                .find_by_primary_key(key)
                .map_err(StoreError::Query)
        });
        self.sink.observe("item_find", result)
    }

    /// Number of stored records of `type_name`.
    pub fn count_items(&self, type_name: &str) -> StoreResult<u64> {
        let result = lookup(&self.registry, type_name).and_then(|schema| {
            SqliteRecordRepository::new(&self.conn, schema)
                .count()
                .map_err(StoreError::Query)
        });
        self.sink.observe("items_count", result)
    }

    /// Translates `filter` into the engine's predicate syntax.
    pub fn convert_filter(filter: &FilterSpec) -> String {
        convert_filter(filter)
    }

    /// Raw engine handle for queries this facade does not cover.
    ///
    /// Bypasses schema checks, transactions and the error sink.
    pub fn model(&self) -> &Connection {
        &self.conn
    }

    /// Mutable raw engine handle; same caveats as `model`.
    pub fn model_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("schemas", &self.registry.keys())
            .field("schema_version", &self.schema_version)
            .field("sink", &self.sink)
            .finish()
    }
}

fn lookup<'r>(registry: &'r SchemaRegistry, type_name: &str) -> StoreResult<&'r SchemaDefinition> {
    registry
        .get(type_name)
        .ok_or_else(|| StoreError::SchemaNotFound(type_name.to_string()))
}

fn as_object<'v>(schema: &SchemaDefinition, value: &'v Value) -> DbResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| DbError::NotAnObject(schema.name.clone()))
}

/// Runs `work` in an immediate transaction; dropping it on error rolls back.
fn in_write_tx<T>(
    conn: &mut Connection,
    work: impl FnOnce(&Transaction<'_>) -> DbResult<T>,
) -> DbResult<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let output = work(&tx)?;
    tx.commit()?;
    Ok(output)
}

fn clear_type(conn: &mut Connection, schema: &SchemaDefinition) -> StoreResult<usize> {
    in_write_tx(conn, |tx| SqliteRecordRepository::new(tx, schema).delete_all())
        .map_err(StoreError::Write)
}
