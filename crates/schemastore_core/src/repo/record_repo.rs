//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Translate JSON field maps into typed column writes for one schema.
//! - Decode rows back into `Record` snapshots.
//!
//! # Invariants
//! - Write paths check property names and value kinds before any SQL runs.
//! - Read paths reject persisted values that do not match the declared kind.
//! - Repositories never open transactions; callers pass a transaction when
//!   atomicity is required.

use crate::db::{quote_ident, DbError, DbResult};
use crate::model::record::{Record, RowId};
use crate::schema::{PropertyKind, PropertySpec, SchemaDefinition};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// Repository interface for record CRUD on one schema.
pub trait RecordRepository {
    fn insert(&self, value: &Map<String, Value>) -> DbResult<Record>;
    fn merge(&self, value: &Map<String, Value>) -> DbResult<Record>;
    fn delete(&self, row_id: RowId) -> DbResult<()>;
    fn delete_all(&self) -> DbResult<usize>;
    fn count(&self) -> DbResult<u64>;
    fn list(&self, predicate: Option<&str>) -> DbResult<Vec<Record>>;
    fn get(&self, row_id: RowId) -> DbResult<Option<Record>>;
    fn find_by_primary_key(&self, key: &Value) -> DbResult<Option<Record>>;
}

/// SQLite-backed repository for the table of one schema.
///
/// `conn` may be a plain connection or a `Transaction` (via deref).
pub struct SqliteRecordRepository<'a> {
    conn: &'a Connection,
    schema: &'a SchemaDefinition,
}

impl<'a> SqliteRecordRepository<'a> {
    pub fn new(conn: &'a Connection, schema: &'a SchemaDefinition) -> Self {
        Self { conn, schema }
    }

    fn table(&self) -> String {
        quote_ident(&self.schema.name)
    }

    fn select_sql(&self) -> String {
        let mut columns = vec!["rowid".to_string()];
        columns.extend(
            self.schema
                .properties
                .iter()
                .map(|property| quote_ident(&property.name)),
        );
        format!("SELECT {} FROM {}", columns.join(", "), self.table())
    }

    /// Converts every field of `value` into a bound column value.
    fn bind_fields(&self, value: &Map<String, Value>) -> DbResult<Vec<(String, SqlValue)>> {
        value
            .iter()
            .map(|(field, field_value)| {
                let property =
                    self.schema
                        .property(field)
                        .ok_or_else(|| DbError::UnknownProperty {
                            schema: self.schema.name.clone(),
                            property: field.clone(),
                        })?;
                Ok((
                    property.name.clone(),
                    to_sql_value(self.schema, property, field_value)?,
                ))
            })
            .collect()
    }

    fn ensure_required_present(&self, value: &Map<String, Value>) -> DbResult<()> {
        match self
            .schema
            .properties
            .iter()
            .find(|property| !property.optional && !value.contains_key(&property.name))
        {
            Some(missing) => Err(DbError::InvalidValue {
                schema: self.schema.name.clone(),
                property: missing.name.clone(),
                message: "required property is missing".to_string(),
            }),
            None => Ok(()),
        }
    }

    fn primary_key_row_id(&self, pk: &PropertySpec, key: &Value) -> DbResult<Option<RowId>> {
        let bound = to_sql_value(self.schema, pk, key)?;
        let row_id = self
            .conn
            .query_row(
                &format!(
                    "SELECT rowid FROM {} WHERE {} = ?1;",
                    self.table(),
                    quote_ident(&pk.name)
                ),
                [bound],
                |row| row.get::<_, RowId>(0),
            )
            .optional()?;
        Ok(row_id)
    }

    fn insert_bound(&self, columns: Vec<(String, SqlValue)>) -> DbResult<Record> {
        if columns.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {} DEFAULT VALUES;", self.table()), [])?;
        } else {
            let names = columns
                .iter()
                .map(|(name, _)| quote_ident(name))
                .collect::<Vec<_>>();
            let placeholders = (1..=columns.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>();
            self.conn.execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES ({});",
                    self.table(),
                    names.join(", "),
                    placeholders.join(", ")
                ),
                params_from_iter(columns.into_iter().map(|(_, value)| value)),
            )?;
        }

        let row_id = self.conn.last_insert_rowid();
        self.get(row_id)?.ok_or_else(|| {
            DbError::InvalidData(format!(
                "inserted `{}` row {row_id} could not be read back",
                self.schema.name
            ))
        })
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn insert(&self, value: &Map<String, Value>) -> DbResult<Record> {
        let columns = self.bind_fields(value)?;
        self.ensure_required_present(value)?;
        self.insert_bound(columns)
    }

    fn merge(&self, value: &Map<String, Value>) -> DbResult<Record> {
        let missing_key = || DbError::MissingPrimaryKey(self.schema.name.clone());
        let pk = self.schema.primary_key_property().ok_or_else(missing_key)?;
        let key = value
            .get(&pk.name)
            .filter(|key| !key.is_null())
            .ok_or_else(missing_key)?;

        let columns = self.bind_fields(value)?;
        let Some(row_id) = self.primary_key_row_id(pk, key)? else {
            self.ensure_required_present(value)?;
            return self.insert_bound(columns);
        };

        let updates = columns
            .into_iter()
            .filter(|(name, _)| *name != pk.name)
            .collect::<Vec<_>>();
        if !updates.is_empty() {
            let assignments = updates
                .iter()
                .enumerate()
                .map(|(index, (name, _))| format!("{} = ?{}", quote_ident(name), index + 1))
                .collect::<Vec<_>>();
            let row_id_param = updates.len() + 1;
            let mut params = updates
                .into_iter()
                .map(|(_, value)| value)
                .collect::<Vec<_>>();
            params.push(SqlValue::Integer(row_id));
            self.conn.execute(
                &format!(
                    "UPDATE {} SET {} WHERE rowid = ?{row_id_param};",
                    self.table(),
                    assignments.join(", ")
                ),
                params_from_iter(params),
            )?;
        }

        self.get(row_id)?.ok_or_else(|| DbError::RecordNotFound {
            schema: self.schema.name.clone(),
            row_id,
        })
    }

    fn delete(&self, row_id: RowId) -> DbResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE rowid = ?1;", self.table()),
            [row_id],
        )?;

        if changed == 0 {
            return Err(DbError::RecordNotFound {
                schema: self.schema.name.clone(),
                row_id,
            });
        }

        Ok(())
    }

    fn delete_all(&self) -> DbResult<usize> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {};", self.table()), [])?;
        Ok(changed)
    }

    fn count(&self) -> DbResult<u64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", self.table()),
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn list(&self, predicate: Option<&str>) -> DbResult<Vec<Record>> {
        let mut sql = self.select_sql();
        if let Some(predicate) = predicate.filter(|text| !text.trim().is_empty()) {
            sql.push_str(" WHERE (");
            sql.push_str(predicate);
            sql.push(')');
        }
        sql.push_str(" ORDER BY rowid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(self.schema, row)?);
        }

        Ok(records)
    }

    fn get(&self, row_id: RowId) -> DbResult<Option<Record>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE rowid = ?1;", self.select_sql()))?;
        let mut rows = stmt.query([row_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(self.schema, row)?));
        }

        Ok(None)
    }

    fn find_by_primary_key(&self, key: &Value) -> DbResult<Option<Record>> {
        let pk = self
            .schema
            .primary_key_property()
            .ok_or_else(|| DbError::MissingPrimaryKey(self.schema.name.clone()))?;
        match self.primary_key_row_id(pk, key)? {
            Some(row_id) => self.get(row_id),
            None => Ok(None),
        }
    }
}

fn to_sql_value(
    schema: &SchemaDefinition,
    property: &PropertySpec,
    value: &Value,
) -> DbResult<SqlValue> {
    let invalid = |message: &str| DbError::InvalidValue {
        schema: schema.name.clone(),
        property: property.name.clone(),
        message: message.to_string(),
    };

    if value.is_null() {
        return if property.optional {
            Ok(SqlValue::Null)
        } else {
            Err(invalid("required property cannot be null"))
        };
    }

    match property.kind {
        PropertyKind::Int => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| invalid("expected an integer")),
        PropertyKind::Float => value
            .as_f64()
            .map(SqlValue::Real)
            .ok_or_else(|| invalid("expected a number")),
        PropertyKind::Text => value
            .as_str()
            .map(|text| SqlValue::Text(text.to_string()))
            .ok_or_else(|| invalid("expected a string")),
        PropertyKind::Bool => value
            .as_bool()
            .map(|flag| SqlValue::Integer(i64::from(flag)))
            .ok_or_else(|| invalid("expected a boolean")),
        PropertyKind::Uuid => value
            .as_str()
            .and_then(|text| Uuid::parse_str(text).ok())
            .map(|uuid| SqlValue::Text(uuid.to_string()))
            .ok_or_else(|| invalid("expected a uuid string")),
        PropertyKind::Json => Ok(SqlValue::Text(value.to_string())),
    }
}

fn parse_record_row(schema: &SchemaDefinition, row: &Row<'_>) -> DbResult<Record> {
    let row_id: RowId = row.get(0)?;
    let mut fields = Map::new();

    for (index, property) in schema.properties.iter().enumerate() {
        let raw = row.get_ref(index + 1)?;
        let value = from_sql_value(property.kind, raw).ok_or_else(|| {
            DbError::InvalidData(format!(
                "unexpected {:?} value in {}.{}",
                raw.data_type(),
                schema.name,
                property.name
            ))
        })?;
        fields.insert(property.name.clone(), value);
    }

    Ok(Record {
        schema: schema.name.clone(),
        row_id,
        fields,
    })
}

fn from_sql_value(kind: PropertyKind, raw: ValueRef<'_>) -> Option<Value> {
    if let ValueRef::Null = raw {
        return Some(Value::Null);
    }

    match (kind, raw) {
        (PropertyKind::Int, ValueRef::Integer(number)) => Some(Value::from(number)),
        (PropertyKind::Float, ValueRef::Real(number)) => {
            Number::from_f64(number).map(Value::Number)
        }
        (PropertyKind::Float, ValueRef::Integer(number)) => {
            Number::from_f64(number as f64).map(Value::Number)
        }
        (PropertyKind::Bool, ValueRef::Integer(0)) => Some(Value::Bool(false)),
        (PropertyKind::Bool, ValueRef::Integer(1)) => Some(Value::Bool(true)),
        (PropertyKind::Text | PropertyKind::Uuid, ValueRef::Text(bytes)) => {
            std::str::from_utf8(bytes)
                .ok()
                .map(|text| Value::String(text.to_string()))
        }
        (PropertyKind::Json, ValueRef::Text(bytes)) => serde_json::from_slice(bytes).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{from_sql_value, to_sql_value};
    use crate::db::DbError;
    use crate::schema::{PropertyKind, PropertySpec, SchemaDefinition};
    use rusqlite::types::{Value as SqlValue, ValueRef};
    use serde_json::{json, Value};

    fn schema() -> SchemaDefinition {
        SchemaDefinition::new("Item")
            .with_property(PropertySpec::required("count", PropertyKind::Int))
            .with_property(PropertySpec::optional("note", PropertyKind::Text))
    }

    #[test]
    fn required_property_rejects_null() {
        let schema = schema();
        let err = to_sql_value(&schema, &schema.properties[0], &Value::Null).unwrap_err();
        assert!(matches!(err, DbError::InvalidValue { property, .. } if property == "count"));
    }

    #[test]
    fn optional_property_accepts_null() {
        let schema = schema();
        let bound = to_sql_value(&schema, &schema.properties[1], &Value::Null).unwrap();
        assert_eq!(bound, SqlValue::Null);
    }

    #[test]
    fn int_property_rejects_fractional_numbers() {
        let schema = schema();
        assert!(to_sql_value(&schema, &schema.properties[0], &json!(1.5)).is_err());
        assert_eq!(
            to_sql_value(&schema, &schema.properties[0], &json!(7)).unwrap(),
            SqlValue::Integer(7)
        );
    }

    #[test]
    fn uuid_property_normalizes_case() {
        let schema = SchemaDefinition::new("Doc")
            .with_property(PropertySpec::required("id", PropertyKind::Uuid));
        let bound = to_sql_value(
            &schema,
            &schema.properties[0],
            &json!("6F9619FF-8B86-D011-B42D-00C04FC964FF"),
        )
        .unwrap();
        assert_eq!(
            bound,
            SqlValue::Text("6f9619ff-8b86-d011-b42d-00c04fc964ff".to_string())
        );
    }

    #[test]
    fn bool_decoding_rejects_out_of_range_integers() {
        assert_eq!(
            from_sql_value(PropertyKind::Bool, ValueRef::Integer(1)),
            Some(Value::Bool(true))
        );
        assert_eq!(from_sql_value(PropertyKind::Bool, ValueRef::Integer(2)), None);
    }

    #[test]
    fn json_decoding_parses_stored_text() {
        assert_eq!(
            from_sql_value(PropertyKind::Json, ValueRef::Text(br#"{"a":[1,2]}"#)),
            Some(json!({"a": [1, 2]}))
        );
    }
}
