//! Schema materialization and version migration.
//!
//! # Responsibility
//! - Create one table per declared schema.
//! - Add newly declared columns and run the caller's migration routine when
//!   the requested schema version is ahead of the stored one.
//!
//! # Invariants
//! - The stored version never exceeds the requested version after open.
//! - A migration step is atomic: tables, columns, callback and the version
//!   bump commit together or not at all.
//! - Column changes without a version bump are rejected.

use crate::db::{quote_ident, DbError, DbResult};
use crate::schema::{SchemaDefinition, SchemaRegistry};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashSet;
use std::time::Instant;

/// Caller-supplied migration routine.
///
/// Receives the open migration transaction, the stored version and the
/// requested version. Runs only for databases that already carry a version.
pub type MigrationFn = Box<dyn Fn(&Connection, u32, u32) -> DbResult<()> + Send + Sync>;

/// Materializes every registered schema and reconciles the stored version.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is newer than `version`.
/// - `MigrationRequired` when columns are missing but `version` is unchanged.
/// - `Migration` when the caller's routine fails.
pub fn apply_schema(
    conn: &mut Connection,
    registry: &SchemaRegistry,
    version: u32,
    migration: Option<&MigrationFn>,
) -> DbResult<()> {
    let started_at = Instant::now();
    let current = current_user_version(conn)?;

    if current > version {
        error!(
            "event=db_migrate module=db status=error error_code=unsupported_version db_version={} requested={}",
            current, version
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            requested: version,
        });
    }

    let upgrading = current < version;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    for schema in registry.schemas() {
        let existing = table_columns(&tx, &schema.name)?;
        if existing.is_empty() {
            tx.execute_batch(&create_table_sql(schema))?;
            continue;
        }

        for property in &schema.properties {
            if existing.contains(&property.name.to_ascii_lowercase()) {
                continue;
            }
            if !upgrading {
                return Err(DbError::MigrationRequired {
                    schema: schema.name.clone(),
                    column: property.name.clone(),
                });
            }
            let mut sql = format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quote_ident(&schema.name),
                quote_ident(&property.name),
                property.kind.column_type()
            );
            if !property.optional {
                sql.push_str(" NOT NULL DEFAULT ");
                sql.push_str(property.kind.zero_default_sql());
            }
            tx.execute_batch(&sql)?;
        }
    }

    if upgrading {
        if current > 0 {
            if let Some(migrate) = migration {
                migrate(&*tx, current, version).map_err(|err| match err {
                    failed @ DbError::Migration(_) => failed,
                    other => DbError::Migration(other.to_string()),
                })?;
                info!(
                    "event=db_migrate module=db status=callback_ok from_version={} to_version={}",
                    current, version
                );
            }
        }
        tx.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} schemas={} duration_ms={}",
        current,
        version,
        registry.len(),
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn create_table_sql(schema: &SchemaDefinition) -> String {
    let columns = schema
        .properties
        .iter()
        .map(|property| {
            let mut column = format!(
                "{} {}",
                quote_ident(&property.name),
                property.kind.column_type()
            );
            if schema.primary_key.as_deref() == Some(property.name.as_str()) {
                column.push_str(" PRIMARY KEY");
            }
            if !property.optional {
                column.push_str(" NOT NULL");
            }
            column
        })
        .collect::<Vec<_>>();

    if columns.is_empty() {
        // SQLite needs at least one column; the row id alone identifies records.
        return format!(
            "CREATE TABLE {} (\"_placeholder\" INTEGER);",
            quote_ident(&schema.name)
        );
    }

    format!(
        "CREATE TABLE {} ({});",
        quote_ident(&schema.name),
        columns.join(", ")
    )
}

/// Lower-cased column names of `table`; empty when the table does not exist.
fn table_columns(conn: &Connection, table: &str) -> DbResult<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let mut rows = stmt.query([table])?;
    let mut columns = HashSet::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        columns.insert(name.to_ascii_lowercase());
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::create_table_sql;
    use crate::schema::{PropertyKind, PropertySpec, SchemaDefinition};

    #[test]
    fn create_table_marks_primary_key_and_required_columns() {
        let schema = SchemaDefinition::new("User")
            .with_primary_key("id")
            .with_property(PropertySpec::required("id", PropertyKind::Int))
            .with_property(PropertySpec::optional("name", PropertyKind::Text));

        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE \"User\" (\"id\" INTEGER PRIMARY KEY NOT NULL, \"name\" TEXT);"
        );
    }

    #[test]
    fn create_table_without_properties_keeps_one_column() {
        let sql = create_table_sql(&SchemaDefinition::new("Marker"));
        assert!(sql.contains("_placeholder"));
    }
}
