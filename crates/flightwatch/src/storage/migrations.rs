//! Database migrations for flightwatch.
//!
//! The schema version lives in `PRAGMA user_version`. Each migration runs in
//! its own transaction together with the version bump, so a database is
//! never left half-migrated.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{V1_STATEMENTS, V2_STATEMENTS};

/// Migrations in order; entry `i` brings the schema to version `i + 1`.
const MIGRATIONS: &[&[&str]] = &[V1_STATEMENTS, V2_STATEMENTS];

/// The schema version this build expects.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bring the database schema up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if the stored version is newer than this build or a
/// migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for target in (version + 1)..=CURRENT_VERSION {
        run_migration(conn, target)?;
        info!("Migrated database schema to version {}", target);
    }
    Ok(())
}

/// Read the stored schema version (0 for a fresh database).
fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Apply the migration that produces `version`.
fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    let statements = usize::try_from(version - 1)
        .ok()
        .and_then(|i| MIGRATIONS.get(i))
        .ok_or_else(|| Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        })?;

    let tx = conn.unchecked_transaction()?;
    for statement in *statements {
        tx.execute(statement, [])?;
    }
    tx.pragma_update(None, "user_version", version)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_initialize_schema_creates_tables() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        assert!(table_exists(&conn, "flight_state"));
        assert!(table_exists(&conn, "flight_events"));
    }

    #[test]
    fn test_initialize_schema_sets_version() {
        let conn = create_test_db();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        initialize_schema(&conn).expect("failed to initialize schema");
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_schema_idempotent() {
        let conn = create_test_db();

        initialize_schema(&conn).expect("first init failed");
        initialize_schema(&conn).expect("second init failed");

        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_upgrade_from_v1() {
        let conn = create_test_db();
        run_migration(&conn, 1).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);

        initialize_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='flight_events'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect();
        assert!(indexes.iter().any(|n| n.contains("registration")));
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = create_test_db();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1)
            .unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_run_migration_unknown_version() {
        let conn = create_test_db();
        let err = run_migration(&conn, 999).unwrap_err();
        assert!(err.to_string().contains("unknown migration version"));

        let err = run_migration(&conn, 0).unwrap_err();
        assert!(err.to_string().contains("unknown migration version"));
    }
}
