use rusqlite::Connection;
use schemastore_core::{
    DbError, ErrorKind, PropertyKind, PropertySpec, SchemaDefinition, Store, StoreOptions,
    DEFAULT_SCHEMA_VERSION,
};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};

fn user_v1() -> SchemaDefinition {
    SchemaDefinition::new("User")
        .with_primary_key("id")
        .with_property(PropertySpec::required("id", PropertyKind::Int))
        .with_property(PropertySpec::required("name", PropertyKind::Text))
}

fn user_v2() -> SchemaDefinition {
    user_v1()
        .with_property(PropertySpec::optional("nickname", PropertyKind::Text))
        .with_property(PropertySpec::required("score", PropertyKind::Int))
}

fn seed_v1(path: &Path) {
    let mut store = Store::setup(StoreOptions::new(vec![user_v1()]).path(path)).unwrap();
    store
        .create_item("User", &json!({"id": 1, "name": "Ann"}))
        .unwrap();
}

fn user_version(path: &Path) -> u32 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn has_column(path: &Path, table: &str, column: &str) -> bool {
    let conn = Connection::open(path).unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2;",
            [table, column],
            |row| row.get(0),
        )
        .unwrap();
    count == 1
}

#[test]
fn setup_defaults_to_version_one() {
    let store = Store::setup(StoreOptions::new(vec![user_v1()])).unwrap();

    assert_eq!(store.schema_version(), DEFAULT_SCHEMA_VERSION);
    let stored: u32 = store
        .model()
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, 1);
}

#[test]
fn invalid_schema_fails_setup_and_notifies_callback() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let broken = SchemaDefinition::new("User").with_primary_key("id");

    let err = Store::setup(
        StoreOptions::new(vec![broken])
            .on_error(move |err| sink_seen.lock().unwrap().push(err.kind())),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Setup);
    assert!(matches!(err.db_error(), Some(DbError::InvalidSchema(_))));
    assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::Setup]);
}

#[test]
fn reopening_file_store_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    seed_v1(&path);

    let store = Store::setup(StoreOptions::new(vec![user_v1()]).path(&path)).unwrap();

    let items = store.get_items("User", None).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("name"), Some(&json!("Ann")));
    assert_eq!(user_version(&path), 1);
}

#[test]
fn version_bump_adds_columns_and_runs_migration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    seed_v1(&path);

    let calls = Arc::new(Mutex::new(Vec::new()));
    let migration_calls = Arc::clone(&calls);
    let store = Store::setup(
        StoreOptions::new(vec![user_v2()])
            .path(&path)
            .schema_version(2)
            .migration(move |conn, old_version, new_version| {
                migration_calls
                    .lock()
                    .unwrap()
                    .push((old_version, new_version));
                conn.execute("UPDATE \"User\" SET nickname = name;", [])?;
                Ok(())
            }),
    )
    .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![(1, 2)]);
    let record = store.find_by_primary_key("User", &json!(1)).unwrap().unwrap();
    assert_eq!(record.get("nickname"), Some(&json!("Ann")));
    assert_eq!(record.get("score"), Some(&json!(0)));
    drop(store);
    assert_eq!(user_version(&path), 2);
}

#[test]
fn migration_is_not_run_for_fresh_database() {
    let calls = Arc::new(Mutex::new(0_u32));
    let migration_calls = Arc::clone(&calls);

    Store::setup(
        StoreOptions::new(vec![user_v2()])
            .schema_version(3)
            .migration(move |_, _, _| {
                *migration_calls.lock().unwrap() += 1;
                Ok(())
            }),
    )
    .unwrap();

    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn failing_migration_rolls_back_the_upgrade() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    seed_v1(&path);

    let err = Store::setup(
        StoreOptions::new(vec![user_v2()])
            .path(&path)
            .schema_version(2)
            .migration(|_, _, _| Err(DbError::Migration("backfill failed".to_string()))),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Setup);
    assert!(matches!(
        err.db_error(),
        Some(DbError::Migration(message)) if message == "backfill failed"
    ));
    assert_eq!(user_version(&path), 1);
    assert!(!has_column(&path, "User", "nickname"));
}

#[test]
fn newer_stored_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 9;").unwrap();
    drop(conn);

    let err = Store::setup(StoreOptions::new(vec![user_v1()]).path(&path)).unwrap_err();

    assert!(matches!(
        err.db_error(),
        Some(DbError::UnsupportedSchemaVersion {
            db_version: 9,
            requested: 1
        })
    ));
}

#[test]
fn schema_change_without_version_bump_requires_migration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    seed_v1(&path);

    let err = Store::setup(StoreOptions::new(vec![user_v2()]).path(&path)).unwrap_err();

    assert!(matches!(
        err.db_error(),
        Some(DbError::MigrationRequired { schema, column }) if schema == "User" && column == "nickname"
    ));
}

#[test]
fn stores_are_isolated_from_each_other() {
    let mut first = Store::setup(StoreOptions::new(vec![user_v1()])).unwrap();
    let second = Store::setup(StoreOptions::new(vec![user_v1()])).unwrap();

    first
        .create_item("User", &json!({"id": 1, "name": "Ann"}))
        .unwrap();

    assert_eq!(first.count_items("User").unwrap(), 1);
    assert_eq!(second.count_items("User").unwrap(), 0);
}

#[test]
fn schemas_load_from_json() {
    let schemas: Vec<SchemaDefinition> = serde_json::from_value(json!([
        {
            "name": "Task",
            "primaryKey": "uuid",
            "properties": [
                {"name": "uuid", "kind": "uuid"},
                {"name": "done", "kind": "bool"},
                {"name": "weight", "kind": "float", "optional": true}
            ]
        }
    ]))
    .unwrap();
    let mut store = Store::setup(StoreOptions::new(schemas)).unwrap();

    let record = store
        .create_item(
            "Task",
            &json!({"uuid": "6f9619ff-8b86-d011-b42d-00c04fc964ff", "done": false, "weight": 0.5}),
        )
        .unwrap();

    assert_eq!(record.get("done"), Some(&json!(false)));
    assert_eq!(record.get("weight"), Some(&json!(0.5)));
}
