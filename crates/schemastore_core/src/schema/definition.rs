//! Record-type definitions declared at setup.
//!
//! # Responsibility
//! - Describe one record type (table) and its typed properties (columns).
//! - Validate declarations before any engine state is created.
//!
//! # Invariants
//! - Schema and property names are plain identifiers.
//! - A primary key, when declared, names a required `Int`/`Text`/`Uuid`
//!   property of the same schema.

use crate::db::DbError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile")
});

/// Returns whether `value` can be used unquoted as a table or column name.
pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Storage kind for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    Text,
    /// Boolean, stored as `0`/`1`.
    Bool,
    /// Canonical UUID string.
    Uuid,
    /// Arbitrary JSON value stored as serialized text.
    Json,
}

impl PropertyKind {
    /// Column type used in `CREATE TABLE`.
    pub fn column_type(self) -> &'static str {
        match self {
            Self::Int | Self::Bool => "INTEGER",
            Self::Float => "REAL",
            Self::Text | Self::Uuid | Self::Json => "TEXT",
        }
    }

    /// Literal used as `DEFAULT` when a required column is added to an
    /// existing table.
    pub fn zero_default_sql(self) -> &'static str {
        match self {
            Self::Int | Self::Bool => "0",
            Self::Float => "0.0",
            Self::Text => "''",
            Self::Uuid => "'00000000-0000-0000-0000-000000000000'",
            Self::Json => "'null'",
        }
    }

    fn can_be_primary_key(self) -> bool {
        matches!(self, Self::Int | Self::Text | Self::Uuid)
    }
}

/// One typed property of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default)]
    pub optional: bool,
}

impl PropertySpec {
    pub fn required(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
        }
    }
}

/// Declaration of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default, alias = "primaryKey")]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
}

impl SchemaDefinition {
    /// Creates a schema without a primary key and without properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            properties: Vec::new(),
        }
    }

    /// Sets the primary-key property name.
    pub fn with_primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = Some(name.into());
        self
    }

    /// Appends one property.
    pub fn with_property(mut self, property: PropertySpec) -> Self {
        self.properties.push(property);
        self
    }

    /// Looks up a declared property by name.
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Returns the primary-key property, if one is declared.
    pub fn primary_key_property(&self) -> Option<&PropertySpec> {
        self.primary_key
            .as_deref()
            .and_then(|name| self.property(name))
    }

    /// Checks identifier rules, property uniqueness and primary-key shape.
    pub fn validate(&self) -> Result<(), DbError> {
        if !is_identifier(&self.name) {
            return Err(DbError::InvalidSchema(format!(
                "schema name `{}` is not a plain identifier",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for property in &self.properties {
            if !is_identifier(&property.name) {
                return Err(DbError::InvalidSchema(format!(
                    "property name `{}` in schema `{}` is not a plain identifier",
                    property.name, self.name
                )));
            }
            if property.name.eq_ignore_ascii_case("rowid") {
                return Err(DbError::InvalidSchema(format!(
                    "property name `rowid` is reserved (schema `{}`)",
                    self.name
                )));
            }
            if !seen.insert(property.name.to_ascii_lowercase()) {
                return Err(DbError::InvalidSchema(format!(
                    "duplicate property `{}` in schema `{}`",
                    property.name, self.name
                )));
            }
        }

        if let Some(pk) = self.primary_key.as_deref() {
            let property = self.property(pk).ok_or_else(|| {
                DbError::InvalidSchema(format!(
                    "primary key `{pk}` is not a property of schema `{}`",
                    self.name
                ))
            })?;
            if property.optional || !property.kind.can_be_primary_key() {
                return Err(DbError::InvalidSchema(format!(
                    "primary key `{pk}` of schema `{}` must be a required int, text or uuid property",
                    self.name
                )));
            }
        }

        Ok(())
    }
}
