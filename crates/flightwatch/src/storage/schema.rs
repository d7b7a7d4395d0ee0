//! `SQLite` schema definitions for flightwatch.
//!
//! Statements are grouped by the schema version that introduced them.

/// SQL statement to create the flight state table.
///
/// One row per registration and set (`active` or `notified`).
pub const CREATE_FLIGHT_STATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flight_state (
    registration TEXT NOT NULL,
    category TEXT NOT NULL,
    PRIMARY KEY (registration, category)
)
";

/// SQL statement to create the flight event log.
pub const CREATE_FLIGHT_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flight_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    registration TEXT NOT NULL,
    kind TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT '{}'
)
";

/// SQL statement to create an index on registration for per-aircraft queries.
pub const CREATE_REGISTRATION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flight_events_registration ON flight_events(registration)
";

/// Version 1: state and event tables.
pub const V1_STATEMENTS: &[&str] = &[CREATE_FLIGHT_STATE_TABLE, CREATE_FLIGHT_EVENTS_TABLE];

/// Version 2: per-registration event lookups.
pub const V2_STATEMENTS: &[&str] = &[CREATE_REGISTRATION_INDEX];
