//! Configuration management for flightwatch.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::aircraft::{Fleet, TrackedAircraft};
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "flightwatch";

/// Default SQLite database file name.
const DATABASE_FILE_NAME: &str = "flightwatch.db";

/// Default directory name for the JSON backend.
const JSON_DIR_NAME: &str = "json";

/// Number of events kept in the history log.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Written in place of a configured secret when the configuration is
/// serialized.
pub const REDACTED: &str = "********";

/// Serialize a secret as [`REDACTED`] when set, `null` otherwise.
#[allow(clippy::ref_option)]
fn redact<S: serde::Serializer>(
    secret: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(_) => serializer.serialize_some(REDACTED),
        None => serializer.serialize_none(),
    }
}

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLIGHTWATCH_`, sections split on `__`)
/// 2. TOML config file at `~/.config/flightwatch/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Aircraft being watched.
    pub fleet: FleetConfig,
    /// Position sources.
    pub sources: SourcesConfig,
    /// Polling schedule.
    pub scheduler: SchedulerConfig,
    /// Persistence.
    pub storage: StorageConfig,
    /// Transition detection.
    pub reconciler: ReconcilerConfig,
    /// Alert delivery.
    pub notify: NotifyConfig,
}

/// The tracked fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Tracked aircraft in display order.
    pub aircraft: Vec<TrackedAircraft>,
}

/// A position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// OpenSky Network.
    Opensky,
    /// ADSB.lol.
    AdsbLol,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opensky => write!(f, "opensky"),
            Self::AdsbLol => write!(f, "adsb_lol"),
        }
    }
}

/// Position source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Sources in priority order, primary first.
    pub order: Vec<SourceKind>,
    /// Pause between consecutive fallback calls in milliseconds.
    pub fallback_delay_ms: u64,
    /// OpenSky settings.
    pub opensky: OpenSkyConfig,
    /// ADSB.lol settings.
    pub adsb_lol: AdsbLolConfig,
}

/// OpenSky Network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSkyConfig {
    /// API base URL.
    pub base_url: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Optional account name for higher rate limits.
    pub username: Option<String>,
    /// Optional account password. Never serialized in clear.
    #[serde(serialize_with = "redact")]
    pub password: Option<String>,
}

/// ADSB.lol settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsbLolConfig {
    /// API base URL.
    pub base_url: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

/// Polling schedule configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between reconciliation passes.
    pub interval_secs: u64,
}

/// Storage backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Single `SQLite` database.
    #[default]
    Sqlite,
    /// Two JSON documents in a directory.
    Json,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to use.
    pub backend: StorageBackend,
    /// Database file (sqlite) or directory (json).
    /// Defaults to a location under `~/.local/share/flightwatch/`.
    pub path: Option<PathBuf>,
    /// Number of events kept in the history log.
    pub history_limit: usize,
}

/// Reconciler configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Leave state untouched for a cycle in which every source call failed,
    /// instead of treating the empty result as "everything landed".
    pub hold_on_source_outage: bool,
}

/// Notification configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Telegram bot token. Never serialized in clear.
    #[serde(serialize_with = "redact")]
    pub telegram_token: Option<String>,
    /// Telegram chat to post into.
    pub telegram_chat_id: Option<String>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            aircraft: vec![
                TrackedAircraft::new("e0659a", "LV-FVZ"),
                TrackedAircraft::new("e06442", "LV-FUF"),
                TrackedAircraft::new("e07a1c", "LV-KMA"),
                TrackedAircraft::new("e02c3f", "LV-CCO"),
            ],
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            order: vec![SourceKind::Opensky, SourceKind::AdsbLol],
            fallback_delay_ms: 500,
            opensky: OpenSkyConfig::default(),
            adsb_lol: AdsbLolConfig::default(),
        }
    }
}

impl Default for OpenSkyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://opensky-network.org/api".to_string(),
            timeout_secs: 30,
            username: None,
            password: None,
        }
    }
}

impl Default for AdsbLolConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.adsb.lol".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: None, // Resolved at runtime
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FLIGHTWATCH_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::ConfigValidation { message });

        if self.fleet.aircraft.is_empty() {
            return invalid("fleet.aircraft must list at least one aircraft".to_string());
        }

        let icao_pattern = Regex::new("^[0-9a-fA-F]{6}$")
            .map_err(|e| Error::internal(format!("bad transponder pattern: {e}")))?;
        let mut ids = HashSet::new();
        let mut registrations = HashSet::new();
        for aircraft in &self.fleet.aircraft {
            if !icao_pattern.is_match(&aircraft.icao24) {
                return invalid(format!(
                    "invalid transponder address '{}' for {}: expected 6 hex digits",
                    aircraft.icao24, aircraft.registration
                ));
            }
            if aircraft.registration.trim().is_empty() {
                return invalid(format!("aircraft {} has no registration", aircraft.icao24));
            }
            if !ids.insert(aircraft.icao24.to_ascii_lowercase()) {
                return invalid(format!("duplicate transponder address '{}'", aircraft.icao24));
            }
            if !registrations.insert(aircraft.registration.as_str()) {
                return invalid(format!("duplicate registration '{}'", aircraft.registration));
            }
        }

        if self.sources.order.is_empty() {
            return invalid("sources.order must name at least one source".to_string());
        }
        let mut seen = HashSet::new();
        for kind in &self.sources.order {
            if !seen.insert(kind) {
                return invalid(format!("source '{kind}' listed more than once"));
            }
        }
        if self.sources.opensky.timeout_secs == 0 || self.sources.adsb_lol.timeout_secs == 0 {
            return invalid("source timeout_secs must be greater than 0".to_string());
        }

        if self.scheduler.interval_secs == 0 {
            return invalid("interval_secs must be greater than 0".to_string());
        }

        if self.storage.history_limit == 0 {
            return invalid("history_limit must be greater than 0".to_string());
        }

        Ok(())
    }

    /// The tracked fleet, with normalized transponder addresses.
    #[must_use]
    pub fn fleet(&self) -> Fleet {
        Fleet::new(
            self.fleet
                .aircraft
                .iter()
                .map(|a| TrackedAircraft::new(&a.icao24, a.registration.clone()))
                .collect(),
        )
    }

    /// Get the storage path, resolving defaults for the selected backend.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.storage.path.clone().unwrap_or_else(|| {
            let dir = Self::default_data_dir();
            match self.storage.backend {
                StorageBackend::Sqlite => dir.join(DATABASE_FILE_NAME),
                StorageBackend::Json => dir.join(JSON_DIR_NAME),
            }
        })
    }

    /// Get the polling interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_secs)
    }
}
