//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `schemastore_core` linkage with an in-memory round trip.
//! - Keep output deterministic for quick local sanity checks.

use schemastore_core::{
    FilterSpec, PropertyKind, PropertySpec, SchemaDefinition, Store, StoreOptions, StoreResult,
};
use serde_json::json;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("schemastore_core version={}", schemastore_core::core_version());
    match round_trip() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("round_trip status=error kind={:?} error={err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

fn round_trip() -> StoreResult<()> {
    let user = SchemaDefinition::new("User")
        .with_primary_key("id")
        .with_property(PropertySpec::required("id", PropertyKind::Int))
        .with_property(PropertySpec::required("name", PropertyKind::Text));
    let mut store = Store::setup(StoreOptions::new(vec![user]))?;

    let created = store.create_item("User", &json!({"id": 1, "name": "Ann"}))?;
    println!("created {}", created.clone().into_value());

    let filter = FilterSpec::fields([("id", json!(1))]);
    println!("filter {}", Store::convert_filter(&filter));
    let found = store.get_items("User", Some(&filter))?;
    println!("found={}", found.len());

    store.delete_item(&created)?;
    println!("remaining={}", store.count_items("User")?);
    Ok(())
}
