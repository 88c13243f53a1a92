//! Filter translation into SQLite `WHERE` predicates.
//!
//! # Responsibility
//! - Pass engine-native predicates through untouched.
//! - Render flat equality mappings as `AND`-joined clauses.
//!
//! # Invariants
//! - Clause order follows mapping insertion order.
//! - String literals are single-quoted with embedded quotes doubled;
//!   numbers and booleans are rendered bare.
//! - Schema-bound rendering compares values in the stored form of the
//!   property kind (canonical uuid, serialized json text).

use crate::db::quote_ident;
use crate::schema::{is_identifier, PropertyKind, SchemaDefinition};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Record selection predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    /// SQLite `WHERE` expression, used verbatim.
    Raw(String),
    /// Field equality pairs, in clause order.
    Fields(Vec<(String, Value)>),
}

impl FilterSpec {
    /// Builds an equality mapping from `(field, value)` pairs.
    pub fn fields<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Fields(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<&str> for FilterSpec {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<String> for FilterSpec {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

/// Uses the map's own iteration order (sorted by key for `serde_json::Map`
/// without `preserve_order`).
impl From<Map<String, Value>> for FilterSpec {
    fn from(value: Map<String, Value>) -> Self {
        Self::Fields(value.into_iter().collect())
    }
}

/// Converts a filter into the engine's predicate string.
///
/// An empty mapping yields an empty string, which readers treat as "no filter".
pub fn convert_filter(filter: &FilterSpec) -> String {
    match filter {
        FilterSpec::Raw(query) => query.clone(),
        FilterSpec::Fields(pairs) => pairs
            .iter()
            .map(|(field, value)| equality_clause(field, value))
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}

/// Converts a filter for one schema, normalizing mapping values the way
/// writes store them.
///
/// Fields that are not declared are rendered as in `convert_filter`.
pub fn convert_filter_for(filter: &FilterSpec, schema: &SchemaDefinition) -> String {
    match filter {
        FilterSpec::Raw(query) => query.clone(),
        FilterSpec::Fields(pairs) => pairs
            .iter()
            .map(|(field, value)| {
                let kind = schema.property(field).map(|property| property.kind);
                equality_clause(field, &stored_form(kind, value))
            })
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}

fn stored_form(kind: Option<PropertyKind>, value: &Value) -> Value {
    match (kind, value) {
        (_, Value::Null) => Value::Null,
        (Some(PropertyKind::Uuid), Value::String(text)) => Uuid::parse_str(text)
            .map(|uuid| Value::String(uuid.to_string()))
            .unwrap_or_else(|_| value.clone()),
        (Some(PropertyKind::Json), other) => Value::String(other.to_string()),
        _ => value.clone(),
    }
}

fn equality_clause(field: &str, value: &Value) -> String {
    let column = if is_identifier(field) {
        field.to_string()
    } else {
        quote_ident(field)
    };

    match value {
        Value::Null => format!("{column} IS NULL"),
        other => format!("{column} = {}", sql_literal(other)),
    }
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => quote_text(text),
        Value::Array(_) | Value::Object(_) => quote_text(&value.to_string()),
    }
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
