use schemastore_core::{
    ErrorKind, PropertyKind, PropertySpec, SchemaDefinition, Store, StoreOptions,
};
use serde_json::json;

fn text_schema(name: &str) -> SchemaDefinition {
    SchemaDefinition::new(name).with_property(PropertySpec::required("label", PropertyKind::Text))
}

fn seeded_store() -> Store {
    let mut store = Store::setup(StoreOptions::new(vec![
        text_schema("Alpha"),
        text_schema("Beta"),
        text_schema("Gamma"),
    ]))
    .unwrap();

    for schema in ["Alpha", "Beta", "Gamma"] {
        for index in 0..2 {
            store
                .create_item(schema, &json!({"label": format!("{schema}-{index}")}))
                .unwrap();
        }
    }
    store
}

#[test]
fn remove_all_for_one_type_leaves_others_untouched() {
    let mut store = seeded_store();

    store.remove_all(Some("Beta")).unwrap();

    assert_eq!(store.count_items("Alpha").unwrap(), 2);
    assert_eq!(store.count_items("Beta").unwrap(), 0);
    assert_eq!(store.count_items("Gamma").unwrap(), 2);
}

#[test]
fn remove_all_without_type_clears_every_registered_type() {
    let mut store = seeded_store();

    store.remove_all(None).unwrap();

    for schema in store.all_keys() {
        assert!(store.get_items(&schema, None).unwrap().is_empty());
    }
}

#[test]
fn remove_all_skips_empty_types() {
    let mut store = seeded_store();
    store.remove_all(Some("Alpha")).unwrap();

    store.remove_all(None).unwrap();

    assert_eq!(store.count_items("Beta").unwrap(), 0);
}

#[test]
fn remove_all_rejects_unknown_type() {
    let mut store = seeded_store();

    let err = store.remove_all(Some("Delta")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaNotFound);
    assert_eq!(store.count_items("Alpha").unwrap(), 2);
}

#[test]
fn failure_on_one_type_keeps_earlier_deletions() {
    let mut store = seeded_store();
    store
        .model_mut()
        .execute_batch(
            "CREATE TRIGGER beta_locked BEFORE DELETE ON \"Beta\"
             BEGIN
                 SELECT RAISE(ABORT, 'beta is locked');
             END;",
        )
        .unwrap();

    let err = store.remove_all(None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Write);
    assert!(err.to_string().contains("beta is locked"));
    assert_eq!(store.count_items("Alpha").unwrap(), 0);
    assert_eq!(store.count_items("Beta").unwrap(), 2);
    assert_eq!(store.count_items("Gamma").unwrap(), 2);
}
