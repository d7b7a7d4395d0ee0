//! Storage layer for flightwatch.
//!
//! Durable home of the [`FlightState`] and the capped flight event log. The
//! reconciler only sees the [`FlightStore`] trait, so the medium can be
//! swapped: `SQLite` by default, or two JSON documents.
//!
//! Every write is all-or-nothing from a reader's point of view.

pub mod json;
pub mod lock;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use std::fmt::Debug;
use std::path::PathBuf;

use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::flight::{FlightEvent, FlightState};

pub use json::JsonFileStore;
pub use lock::StoreLock;
pub use sqlite::SqliteStore;

/// Durable storage for flight state and history.
pub trait FlightStore: Send + Debug {
    /// Load the persisted state.
    ///
    /// Missing or unreadable storage yields an empty state; the problem is
    /// logged, never returned.
    fn load_state(&self) -> FlightState;

    /// Replace the persisted state atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the previous state is then kept.
    fn save_state(&self, state: &FlightState) -> Result<()>;

    /// Load the event log, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn load_history(&self) -> Result<Vec<FlightEvent>>;

    /// Prepend an event and truncate the log to its cap, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the previous log is then kept.
    fn append_event(&self, event: &FlightEvent) -> Result<()>;

    /// Human-readable location of the store.
    fn describe(&self) -> String;

    /// Lock file shared by every process that opens this store.
    ///
    /// `None` for stores no other process can reach.
    fn lock_path(&self) -> Option<PathBuf>;
}

/// Open the store selected by the configuration.
///
/// # Errors
///
/// Returns an error if the backing medium cannot be opened or created.
pub fn open_store(config: &Config) -> Result<Box<dyn FlightStore>> {
    let path = config.storage_path();
    let limit = config.storage.history_limit;
    Ok(match config.storage.backend {
        StorageBackend::Sqlite => Box::new(SqliteStore::open(path, limit)?),
        StorageBackend::Json => Box::new(JsonFileStore::open(path, limit)?),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::flight::{EventDetails, EventKind};

    pub(crate) fn event(registration: &str, kind: EventKind) -> FlightEvent {
        FlightEvent::new(registration, kind, EventDetails::default())
    }

    /// Behaviour every backend must share.
    pub(crate) fn exercise_store(store: &dyn FlightStore, limit: usize) {
        assert_eq!(store.load_state(), FlightState::default());
        assert!(store.load_history().unwrap().is_empty());

        let mut state = FlightState::default();
        state.active.insert("LV-FVZ".to_string());
        state.active.insert("LV-KMA".to_string());
        state.notified.insert("LV-FVZ".to_string());
        store.save_state(&state).unwrap();
        assert_eq!(store.load_state(), state);

        state.active.remove("LV-KMA");
        store.save_state(&state).unwrap();
        assert_eq!(store.load_state(), state);

        store.append_event(&event("LV-FVZ", EventKind::Takeoff)).unwrap();
        store.append_event(&event("LV-FVZ", EventKind::Landing)).unwrap();
        let history = store.load_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, EventKind::Landing);
        assert_eq!(history[1].kind, EventKind::Takeoff);

        for i in 0..(limit + 25) {
            store
                .append_event(&event(&format!("LV-{i:03}"), EventKind::Takeoff))
                .unwrap();
        }
        let history = store.load_history().unwrap();
        assert_eq!(history.len(), limit);
        assert_eq!(history[0].registration, format!("LV-{:03}", limit + 24));
    }

    #[test]
    fn test_open_store_json_backend() {
        let dir = std::env::temp_dir()
            .join(format!("flightwatch_open_store_{}", std::process::id()));
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Json;
        config.storage.path = Some(dir.clone());

        let store = open_store(&config).unwrap();
        assert!(store.describe().contains("flightwatch_open_store"));
        assert_eq!(store.lock_path(), Some(dir.join("flightwatch.lock")));

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
