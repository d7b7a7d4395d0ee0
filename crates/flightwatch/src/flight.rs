//! Persisted flight state and the flight event log entries.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registrations believed airborne, and those already alerted for.
///
/// Outside a reconciliation pass `notified` is a subset of `active`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightState {
    /// Registrations reported in the most recent snapshot.
    pub active: BTreeSet<String>,
    /// Registrations alerted for during their current airborne episode.
    pub notified: BTreeSet<String>,
}

impl FlightState {
    /// Check if a registration is currently believed airborne.
    #[must_use]
    pub fn is_active(&self, registration: &str) -> bool {
        self.active.contains(registration)
    }

    /// Check if a registration has been alerted for in this episode.
    #[must_use]
    pub fn is_notified(&self, registration: &str) -> bool {
        self.notified.contains(registration)
    }
}

/// The kind of transition recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A fresh airborne episode started.
    Takeoff,
    /// An already alerted episode reappeared after a coverage gap.
    InProgress,
    /// The aircraft is no longer reported.
    Landing,
}

impl EventKind {
    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "takeoff" => Some(Self::Takeoff),
            "in_progress" => Some(Self::InProgress),
            "landing" => Some(Self::Landing),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Takeoff => write!(f, "takeoff"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Landing => write!(f, "landing"),
        }
    }
}

/// Enrichment recorded alongside an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDetails {
    /// Altitude in metres.
    pub altitude_m: Option<f64>,
    /// Ground speed in km/h.
    pub speed_kmh: Option<f64>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Source that reported the aircraft.
    pub source: Option<String>,
    /// Name of the nearest airport.
    pub nearest_airport: Option<String>,
    /// Name of the inferred destination airport.
    pub destination_airport: Option<String>,
    /// Emergency classification, when squawking one.
    pub emergency: Option<String>,
}

/// One entry of the flight event log. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightEvent {
    /// Registration of the aircraft.
    pub registration: String,
    /// What happened.
    pub kind: EventKind,
    /// When it was detected.
    pub timestamp: DateTime<Utc>,
    /// Enrichment payload.
    #[serde(default)]
    pub details: EventDetails,
}

impl FlightEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(registration: impl Into<String>, kind: EventKind, details: EventDetails) -> Self {
        Self {
            registration: registration.into(),
            kind,
            timestamp: Utc::now(),
            details,
        }
    }
}
