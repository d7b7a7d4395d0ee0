//! `SQLite` flight store.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::flight::{EventDetails, EventKind, FlightEvent, FlightState};

use super::{lock, migrations, FlightStore};

const ACTIVE: &str = "active";
const NOTIFIED: &str = "notified";
const IN_MEMORY: &str = ":memory:";

/// Flight store backed by a single `SQLite` database.
///
/// State replacement and event appends each run in one transaction, so
/// readers see either the old or the new contents.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Number of events kept in the log.
    history_limit: usize,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>, history_limit: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn,
            history_limit,
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(history_limit: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(IN_MEMORY),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(IN_MEMORY),
            conn,
            history_limit,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load_state(&self) -> Result<FlightState> {
        let mut stmt = self
            .conn
            .prepare("SELECT registration, category FROM flight_state")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut state = FlightState::default();
        for (registration, category) in rows {
            match category.as_str() {
                ACTIVE => {
                    state.active.insert(registration);
                }
                NOTIFIED => {
                    state.notified.insert(registration);
                }
                other => warn!("Ignoring unknown state category '{}' for {}", other, registration),
            }
        }
        Ok(state)
    }

    fn insert_set(
        tx: &rusqlite::Transaction<'_>,
        category: &str,
        registrations: &BTreeSet<String>,
    ) -> Result<()> {
        let mut stmt =
            tx.prepare("INSERT INTO flight_state (registration, category) VALUES (?1, ?2)")?;
        for registration in registrations {
            stmt.execute(params![registration, category])?;
        }
        Ok(())
    }

    /// Convert a database row to a flight event.
    ///
    /// Unknown kinds yield `None`; a damaged details payload is replaced by an
    /// empty one.
    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Option<FlightEvent>> {
        let registration: String = row.get(0)?;
        let kind_str: String = row.get(1)?;
        let timestamp_str: String = row.get(2)?;
        let details_str: String = row.get(3)?;

        let Some(kind) = EventKind::parse(&kind_str) else {
            warn!("Skipping event with unknown kind '{}'", kind_str);
            return Ok(None);
        };
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));
        let details = serde_json::from_str::<EventDetails>(&details_str).unwrap_or_else(|e| {
            warn!("Damaged details for {} event of {}: {}", kind, registration, e);
            EventDetails::default()
        });

        Ok(Some(FlightEvent {
            registration,
            kind,
            timestamp,
            details,
        }))
    }
}

impl FlightStore for SqliteStore {
    fn load_state(&self) -> FlightState {
        self.try_load_state().unwrap_or_else(|e| {
            warn!("Could not read flight state, starting empty: {}", e);
            FlightState::default()
        })
    }

    fn save_state(&self, state: &FlightState) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM flight_state", [])?;
        Self::insert_set(&tx, ACTIVE, &state.active)?;
        Self::insert_set(&tx, NOTIFIED, &state.notified)?;
        tx.commit()?;
        debug!(
            "Saved state: {} active, {} notified",
            state.active.len(),
            state.notified.len()
        );
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<FlightEvent>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT registration, kind, timestamp, details
            FROM flight_events ORDER BY id DESC LIMIT ?1
            ",
        )?;

        let limit = i64::try_from(self.history_limit).unwrap_or(i64::MAX);
        let events = stmt
            .query_map([limit], Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events.into_iter().flatten().collect())
    }

    fn append_event(&self, event: &FlightEvent) -> Result<()> {
        let details = serde_json::to_string(&event.details)?;
        let limit = i64::try_from(self.history_limit).unwrap_or(i64::MAX);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            INSERT INTO flight_events (registration, kind, timestamp, details)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                event.registration,
                event.kind.to_string(),
                event.timestamp.to_rfc3339(),
                details,
            ],
        )?;
        let pruned = tx.execute(
            r"
            DELETE FROM flight_events WHERE id NOT IN (
                SELECT id FROM flight_events ORDER BY id DESC LIMIT ?1
            )
            ",
            [limit],
        )?;
        tx.commit()?;

        if pruned > 0 {
            debug!("Pruned {} old events", pruned);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn lock_path(&self) -> Option<PathBuf> {
        (self.path != Path::new(IN_MEMORY)).then(|| lock::lock_path_for(&self.path))
    }
}
