//! Registered record types for one store instance.
//!
//! # Invariants
//! - The registered set is fixed after construction.
//! - `keys()` preserves registration order.

use crate::db::DbError;
use crate::schema::definition::SchemaDefinition;
use std::collections::{HashMap, HashSet};

/// Declared record types, indexed by name.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<SchemaDefinition>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Validates every definition and records them in order.
    ///
    /// # Errors
    /// - `DbError::InvalidSchema` for an invalid definition or a repeated name.
    pub fn new(schemas: Vec<SchemaDefinition>) -> Result<Self, DbError> {
        let mut names = HashSet::new();
        for schema in &schemas {
            schema.validate()?;
            if !names.insert(schema.name.to_ascii_lowercase()) {
                return Err(DbError::InvalidSchema(format!(
                    "schema `{}` is declared more than once",
                    schema.name
                )));
            }
        }

        let index = schemas
            .iter()
            .enumerate()
            .map(|(position, schema)| (schema.name.clone(), position))
            .collect();

        Ok(Self { schemas, index })
    }

    /// Returns whether `name` is a registered record type.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the definition for `name`.
    pub fn get(&self, name: &str) -> Option<&SchemaDefinition> {
        self.index
            .get(name)
            .and_then(|position| self.schemas.get(*position))
    }

    /// Returns the primary-key field of `name`; `None` for unknown types too.
    pub fn primary_key_of(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|schema| schema.primary_key.as_deref())
    }

    /// Registered type names in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.schemas.iter().map(|schema| schema.name.clone()).collect()
    }

    pub fn schemas(&self) -> &[SchemaDefinition] {
        &self.schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaRegistry;
    use crate::schema::definition::{PropertyKind, PropertySpec, SchemaDefinition};

    fn schemas() -> Vec<SchemaDefinition> {
        vec![
            SchemaDefinition::new("User")
                .with_primary_key("id")
                .with_property(PropertySpec::required("id", PropertyKind::Int)),
            SchemaDefinition::new("Log")
                .with_property(PropertySpec::required("line", PropertyKind::Text)),
        ]
    }

    #[test]
    fn keys_follow_registration_order() {
        let registry = SchemaRegistry::new(schemas()).unwrap();
        assert_eq!(registry.keys(), vec!["User".to_string(), "Log".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn primary_keys_are_indexed_by_name() {
        let registry = SchemaRegistry::new(schemas()).unwrap();
        assert_eq!(registry.primary_key_of("User"), Some("id"));
        assert_eq!(registry.primary_key_of("Log"), None);
        assert!(registry.contains("Log"));
        assert!(!registry.contains("log"));
        assert_eq!(registry.primary_key_of("Ghost"), None);
    }

    #[test]
    fn get_resolves_by_exact_name() {
        let registry = SchemaRegistry::new(schemas()).unwrap();
        assert_eq!(registry.get("Log").map(|schema| schema.name.as_str()), Some("Log"));
        assert!(registry.get("LOG").is_none());
    }

    #[test]
    fn duplicate_schema_names_are_rejected() {
        let mut declared = schemas();
        declared.push(SchemaDefinition::new("user"));
        assert!(SchemaRegistry::new(declared).is_err());
    }
}
