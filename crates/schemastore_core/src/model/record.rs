//! Snapshot of one stored row.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Engine row identity (SQLite `rowid`).
pub type RowId = i64;

/// One stored instance of a registered record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Registered type name the row belongs to.
    pub schema: String,
    /// Engine row identity; stable until the row is deleted.
    pub row_id: RowId,
    /// Every declared property by name. Absent optionals read as `null`.
    pub fields: Map<String, Value>,
}

impl Record {
    /// Returns one field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns whether every field in `expected` is present with an equal value.
    ///
    /// Numbers compare by value, so `2` matches a stored `2.0`.
    pub fn matches(&self, expected: &Map<String, Value>) -> bool {
        expected.iter().all(|(key, value)| {
            self.fields
                .get(key)
                .is_some_and(|stored| same_value(stored, value))
        })
    }

    /// Consumes the record and returns its fields as a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

fn same_value(stored: &Value, expected: &Value) -> bool {
    match (stored, expected) {
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        _ => stored == expected,
    }
}
