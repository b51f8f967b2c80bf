//! Schema synchronization.
//!
//! Entity classes map to tables through a fixed type map, and the
//! provider reconciles each class with the database once according to
//! the configured [`SchemaMode`].

use ormkit_core::{DataKind, EntityMetadata, Error, Result, SchemaError, Value};

use crate::config::SchemaMode;
use crate::connection::SqliteConnection;

/// SQLite column type for a data kind.
///
/// Integers map to INTEGER, floating-point kinds to REAL, booleans and
/// temporal kinds to NUMERIC, character kinds to TEXT, and everything
/// else to BLOB.
#[must_use]
pub fn column_type(kind: DataKind) -> &'static str {
    match kind {
        DataKind::SmallInt | DataKind::Int | DataKind::BigInt => "INTEGER",
        DataKind::Float | DataKind::Double => "REAL",
        DataKind::Bool | DataKind::Date | DataKind::Time | DataKind::DateTime => "NUMERIC",
        DataKind::Char | DataKind::Text => "TEXT",
        DataKind::Blob => "BLOB",
    }
}

/// The CREATE TABLE statement for an entity class. Simple properties
/// come first, then foreign-key columns typed after the target class's
/// object ID, declaration order throughout.
#[must_use]
pub fn create_table_statement(meta: &EntityMetadata) -> String {
    let mut definitions = Vec::new();
    for property in meta.properties() {
        let mut definition = format!("{} {}", property.column, column_type(property.kind));
        if property.object_id {
            definition.push_str(" PRIMARY KEY");
            if property.auto_generated {
                definition.push_str(" AUTOINCREMENT");
            }
        }
        definitions.push(definition);
    }
    for relation in meta.many_to_one() {
        definitions.push(format!(
            "{} {}",
            relation.column,
            column_type(relation.column_kind)
        ));
    }
    format!("CREATE TABLE {} ({})", meta.table(), definitions.join(", "))
}

/// Whether a table of this name exists in the connected database.
#[allow(clippy::result_large_err)]
pub fn table_exists(connection: &SqliteConnection, table: &str) -> Result<bool> {
    let rows = connection.query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = :name",
        &[(":name".to_string(), Value::from(table))],
    )?;
    Ok(!rows.is_empty())
}

/// Reconcile one entity class with the database.
#[allow(clippy::result_large_err)]
pub fn synchronize(
    connection: &SqliteConnection,
    meta: &EntityMetadata,
    mode: SchemaMode,
) -> Result<()> {
    match mode {
        SchemaMode::Bypass => Ok(()),
        SchemaMode::Recreate => {
            if table_exists(connection, meta.table())? {
                connection.execute_raw(&format!("DROP TABLE {}", meta.table()))?;
            }
            connection.execute_raw(&create_table_statement(meta))?;
            tracing::debug!(table = meta.table(), "recreated table");
            Ok(())
        }
        SchemaMode::Update | SchemaMode::Validate => Err(Error::Schema(SchemaError {
            table: meta.table().to_string(),
            message: "Not implemented".to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqliteConfig;
    use crate::test_support::{specimen_metadata, town_metadata};
    use ormkit_core::ErrorKind;

    fn open_memory() -> SqliteConnection {
        SqliteConnection::open(&SqliteConfig::memory()).unwrap()
    }

    #[test]
    fn test_type_map() {
        assert_eq!(column_type(DataKind::BigInt), "INTEGER");
        assert_eq!(column_type(DataKind::Double), "REAL");
        assert_eq!(column_type(DataKind::Bool), "NUMERIC");
        assert_eq!(column_type(DataKind::DateTime), "NUMERIC");
        assert_eq!(column_type(DataKind::Char), "TEXT");
        assert_eq!(column_type(DataKind::Blob), "BLOB");
    }

    #[test]
    fn test_create_table_covers_every_kind() {
        let meta = specimen_metadata();
        assert_eq!(
            create_table_statement(&meta),
            "CREATE TABLE Specimen (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             flag NUMERIC, small INTEGER, weight REAL, ratio REAL, born NUMERIC, \
             alarm NUMERIC, seen NUMERIC, grade TEXT, name TEXT, payload BLOB)"
        );
    }

    #[test]
    fn test_foreign_key_column_typed_after_target() {
        let meta = town_metadata();
        assert_eq!(
            create_table_statement(&meta),
            "CREATE TABLE Town (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             name TEXT, population INTEGER, province_id INTEGER)"
        );
    }

    #[test]
    fn test_recreate_replaces_existing_table() {
        let connection = open_memory();
        let meta = town_metadata();
        synchronize(&connection, &meta, SchemaMode::Recreate).unwrap();
        connection
            .execute_raw("INSERT INTO Town (name, population) VALUES ('Oulu', 200526)")
            .unwrap();
        synchronize(&connection, &meta, SchemaMode::Recreate).unwrap();
        let rows = connection
            .query("SELECT COUNT(*) AS n FROM Town", &[])
            .unwrap();
        assert_eq!(rows[0].get_named::<i64>("n").unwrap(), 0);
    }

    #[test]
    fn test_update_and_validate_are_not_implemented() {
        let connection = open_memory();
        let meta = town_metadata();
        for mode in [SchemaMode::Update, SchemaMode::Validate] {
            let err = synchronize(&connection, &meta, mode).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsynchronizedSchema);
            assert!(err.to_string().contains("Not implemented"));
        }
    }

    #[test]
    fn test_bypass_touches_nothing() {
        let connection = open_memory();
        let meta = town_metadata();
        synchronize(&connection, &meta, SchemaMode::Bypass).unwrap();
        assert!(!table_exists(&connection, meta.table()).unwrap());
    }
}
