//! JSON document flight store.
//!
//! Keeps `state.json` and `history.json` in one directory. Documents are
//! written to a temporary sibling, flushed, then renamed over the original.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::flight::{FlightEvent, FlightState};

use super::FlightStore;

const STATE_FILE: &str = "state.json";
const HISTORY_FILE: &str = "history.json";
const LOCK_FILE: &str = "flightwatch.lock";

/// Flight store backed by two JSON documents.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    history_limit: usize,
}

impl JsonFileStore {
    /// Open a store in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>, history_limit: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|source| Error::DirectoryCreate {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(Self { dir, history_limit })
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    /// Read a document; `Ok(None)` when it does not exist yet.
    fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace `path` with `bytes` in one rename.
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl FlightStore for JsonFileStore {
    fn load_state(&self) -> FlightState {
        let path = self.state_path();
        match Self::read_document(&path) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!("Could not read {}, starting empty: {}", path.display(), e);
                FlightState::default()
            }
        }
    }

    fn save_state(&self, state: &FlightState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        Self::write_atomic(&self.state_path(), &bytes)?;
        debug!(
            "Saved state: {} active, {} notified",
            state.active.len(),
            state.notified.len()
        );
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<FlightEvent>> {
        let mut history: Vec<FlightEvent> =
            Self::read_document(&self.history_path())?.unwrap_or_default();
        history.truncate(self.history_limit);
        Ok(history)
    }

    fn append_event(&self, event: &FlightEvent) -> Result<()> {
        let mut history = self.load_history().unwrap_or_else(|e| {
            warn!("Event log unreadable, starting a new one: {}", e);
            Vec::new()
        });
        history.insert(0, event.clone());
        history.truncate(self.history_limit);

        let bytes = serde_json::to_vec_pretty(&history)?;
        Self::write_atomic(&self.history_path(), &bytes)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.dir.display())
    }

    fn lock_path(&self) -> Option<PathBuf> {
        Some(self.dir.join(LOCK_FILE))
    }
}
