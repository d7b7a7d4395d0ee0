//! Core aircraft types for flightwatch.
//!
//! This module defines the static fleet being watched and the per-cycle
//! position snapshots produced by the position sources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::Position;

/// An aircraft being watched, keyed by its transponder (ICAO 24-bit) address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedAircraft {
    /// Six hex digit transponder address, lower case.
    pub icao24: String,
    /// Human readable registration (tail number).
    pub registration: String,
}

impl TrackedAircraft {
    /// Create a tracked aircraft, normalizing the transponder address.
    #[must_use]
    pub fn new(icao24: impl AsRef<str>, registration: impl Into<String>) -> Self {
        Self {
            icao24: icao24.as_ref().trim().to_ascii_lowercase(),
            registration: registration.into(),
        }
    }
}

/// The static set of tracked aircraft.
///
/// Immutable for the lifetime of the process; iteration follows the
/// configured order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fleet {
    aircraft: Vec<TrackedAircraft>,
}

impl Fleet {
    /// Build a fleet from the configured aircraft.
    #[must_use]
    pub fn new(aircraft: Vec<TrackedAircraft>) -> Self {
        Self { aircraft }
    }

    /// All tracked aircraft in configured order.
    #[must_use]
    pub fn aircraft(&self) -> &[TrackedAircraft] {
        &self.aircraft
    }

    /// Transponder addresses of every tracked aircraft.
    pub fn icao24s(&self) -> impl Iterator<Item = &str> {
        self.aircraft.iter().map(|a| a.icao24.as_str())
    }

    /// Registrations of every tracked aircraft.
    pub fn registrations(&self) -> impl Iterator<Item = &str> {
        self.aircraft.iter().map(|a| a.registration.as_str())
    }

    /// Look up an aircraft by transponder address (case-insensitive).
    #[must_use]
    pub fn by_icao24(&self, icao24: &str) -> Option<&TrackedAircraft> {
        let icao24 = icao24.trim();
        self.aircraft
            .iter()
            .find(|a| a.icao24.eq_ignore_ascii_case(icao24))
    }

    /// Number of tracked aircraft.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    /// Check if the fleet is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }
}

/// One aircraft's observed state for one poll cycle, from one source.
///
/// Produced fresh every cycle and never mutated afterwards. Units are
/// canonical regardless of the source: metres, km/h, degrees and ft/min.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Transponder address, lower case.
    pub icao24: String,
    /// Registration of the tracked aircraft.
    pub registration: String,
    /// Broadcast callsign, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Altitude in metres.
    pub altitude_m: Option<f64>,
    /// Ground speed in km/h.
    pub speed_kmh: Option<f64>,
    /// True track over ground in degrees.
    pub heading: Option<f64>,
    /// Vertical rate in feet per minute.
    pub vertical_rate_fpm: Option<f64>,
    /// Transponder squawk code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squawk: Option<String>,
    /// Country of registration as reported by the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_country: Option<String>,
    /// Name of the source that produced this snapshot.
    pub source: String,
}

impl PositionSnapshot {
    /// Create an empty snapshot for a tracked aircraft.
    #[must_use]
    pub fn new(aircraft: &TrackedAircraft, source: impl Into<String>) -> Self {
        Self {
            icao24: aircraft.icao24.clone(),
            registration: aircraft.registration.clone(),
            callsign: None,
            latitude: None,
            longitude: None,
            altitude_m: None,
            speed_kmh: None,
            heading: None,
            vertical_rate_fpm: None,
            squawk: None,
            origin_country: None,
            source: source.into(),
        }
    }

    /// The reported position, if both coordinates are known.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Position::new(latitude, longitude)),
            _ => None,
        }
    }
}

/// Snapshots keyed by transponder address.
pub type SnapshotMap = BTreeMap<String, PositionSnapshot>;

#[cfg(test)]
mod tests {
    use super::*;

    fn test_fleet() -> Fleet {
        Fleet::new(vec![
            TrackedAircraft::new("E0659A", "LV-FVZ"),
            TrackedAircraft::new("e06442", "LV-FUF"),
        ])
    }

    #[test]
    fn test_tracked_aircraft_normalizes_icao24() {
        let aircraft = TrackedAircraft::new(" E0659A ", "LV-FVZ");
        assert_eq!(aircraft.icao24, "e0659a");
        assert_eq!(aircraft.registration, "LV-FVZ");
    }

    #[test]
    fn test_fleet_lookup_case_insensitive() {
        let fleet = test_fleet();
        assert_eq!(fleet.by_icao24("E0659A").unwrap().registration, "LV-FVZ");
        assert_eq!(fleet.by_icao24("e06442").unwrap().registration, "LV-FUF");
        assert!(fleet.by_icao24("abcdef").is_none());
    }

    #[test]
    fn test_fleet_iterators() {
        let fleet = test_fleet();
        assert_eq!(fleet.len(), 2);
        assert!(!fleet.is_empty());
        assert_eq!(fleet.icao24s().collect::<Vec<_>>(), vec!["e0659a", "e06442"]);
        assert_eq!(
            fleet.registrations().collect::<Vec<_>>(),
            vec!["LV-FVZ", "LV-FUF"]
        );
    }

    #[test]
    fn test_snapshot_position() {
        let fleet = test_fleet();
        let mut snapshot = PositionSnapshot::new(&fleet.aircraft()[0], "opensky");
        assert!(snapshot.position().is_none());

        snapshot.latitude = Some(-34.82);
        assert!(snapshot.position().is_none());

        snapshot.longitude = Some(-58.55);
        let pos = snapshot.position().unwrap();
        assert!((pos.latitude - -34.82).abs() < f64::EPSILON);
        assert!((pos.longitude - -58.55).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_serialization_skips_empty_optionals() {
        let fleet = test_fleet();
        let snapshot = PositionSnapshot::new(&fleet.aircraft()[0], "adsb_lol");
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"registration\":\"LV-FVZ\""));
        assert!(json.contains("\"source\":\"adsb_lol\""));
        assert!(!json.contains("squawk"));
    }
}
