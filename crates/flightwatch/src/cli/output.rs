//! Text and JSON views printed by the CLI.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aircraft::PositionSnapshot;
use crate::flight::FlightEvent;
use crate::geo::{Cardinal, VerticalTrend};
use crate::reconciler::{CycleReport, FlightContext};
use crate::scheduler::StatusReport;

/// One airborne aircraft with its derived context.
#[derive(Debug, Clone, Serialize)]
pub struct AircraftView {
    /// What the source reported.
    #[serde(flatten)]
    pub snapshot: PositionSnapshot,
    /// Nearest airport name.
    pub nearest_airport: Option<String>,
    /// Distance to the nearest airport in km.
    pub nearest_distance_km: Option<f64>,
    /// Inferred destination name.
    pub destination_airport: Option<String>,
    /// Distance to the destination in km.
    pub destination_distance_km: Option<f64>,
    /// Minutes to the destination.
    pub eta_min: Option<i64>,
    /// Compass point of the heading.
    pub cardinal: Option<Cardinal>,
    /// Climbing, descending or level.
    pub vertical_trend: VerticalTrend,
    /// Emergency classification, when squawking one.
    pub emergency: Option<String>,
}

impl From<&PositionSnapshot> for AircraftView {
    fn from(snapshot: &PositionSnapshot) -> Self {
        let context = FlightContext::from_snapshot(snapshot);
        Self {
            snapshot: snapshot.clone(),
            nearest_airport: context.nearest.map(|f| f.airport.name.to_string()),
            nearest_distance_km: context.nearest.map(|f| f.distance_km),
            destination_airport: context.destination.map(|f| f.airport.name.to_string()),
            destination_distance_km: context.destination.map(|f| f.distance_km),
            eta_min: context.eta_destination_min,
            cardinal: context.cardinal,
            vertical_trend: context.trend,
            emergency: context
                .emergency
                .is_emergency()
                .then(|| context.emergency.to_string()),
        }
    }
}

/// Result of `flightwatch check`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutput {
    /// When the pass ran.
    pub timestamp: DateTime<Utc>,
    /// Size of the tracked fleet.
    pub tracked: usize,
    /// Number of aircraft seen airborne.
    pub airborne_count: usize,
    /// The airborne aircraft.
    pub aircraft: Vec<AircraftView>,
    /// State was left untouched because no source answered.
    pub held: bool,
}

impl CheckOutput {
    /// Build the view of one pass over a fleet of `tracked` aircraft.
    #[must_use]
    pub fn new(report: &CycleReport, tracked: usize) -> Self {
        Self {
            timestamp: report.timestamp,
            tracked,
            airborne_count: report.snapshots.len(),
            aircraft: report.snapshots.iter().map(AircraftView::from).collect(),
            held: report.held,
        }
    }
}

fn opt<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v}{unit}"))
}

/// Human-readable rendering of a check.
#[must_use]
pub fn render_check(output: &CheckOutput) -> String {
    let mut text = String::new();
    let _ = writeln!(
        text,
        "{} of {} aircraft airborne at {}",
        output.airborne_count,
        output.tracked,
        output.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if output.held {
        let _ = writeln!(text, "No source answered; state left unchanged.");
    }
    for view in &output.aircraft {
        let s = &view.snapshot;
        let _ = writeln!(text);
        let _ = writeln!(text, "{} ({}) via {}", s.registration, s.icao24, s.source);
        let _ = writeln!(
            text,
            "  altitude {}  speed {}  heading {} {}  {}",
            opt(s.altitude_m.map(|m| format!("{m:.0}")), " m"),
            opt(s.speed_kmh, " km/h"),
            opt(s.heading.map(|h| format!("{h:.0}")), "°"),
            opt(view.cardinal, ""),
            view.vertical_trend
        );
        if let Some(name) = &view.nearest_airport {
            let _ = writeln!(
                text,
                "  near {} ({})",
                name,
                opt(view.nearest_distance_km, " km")
            );
        }
        if let Some(name) = &view.destination_airport {
            let _ = writeln!(
                text,
                "  heading for {} ({}, ETA {})",
                name,
                opt(view.destination_distance_km, " km"),
                opt(view.eta_min, " min")
            );
        }
        if let Some(emergency) = &view.emergency {
            let _ = writeln!(text, "  EMERGENCY: {emergency}");
        }
    }
    text
}

/// Human-readable rendering of the status report.
#[must_use]
pub fn render_status(status: &StatusReport) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "flightwatch status");
    let _ = writeln!(text, "------------------");
    let _ = writeln!(text, "Store:     {}", status.store);
    let _ = writeln!(text, "Sources:   {}", status.sources.join(" -> "));
    let _ = writeln!(text, "Interval:  {}s", status.interval_secs);
    let _ = writeln!(text);
    let _ = writeln!(text, "Tracked:");
    for aircraft in &status.tracked {
        let marker = if status.active.contains(&aircraft.registration) {
            "airborne"
        } else {
            "-"
        };
        let _ = writeln!(
            text,
            "  {:<8} {}  {}",
            aircraft.registration, aircraft.icao24, marker
        );
    }
    text
}

/// Human-readable rendering of the event log.
#[must_use]
pub fn render_history(events: &[FlightEvent]) -> String {
    if events.is_empty() {
        return "No events recorded.\n".to_string();
    }
    let mut text = String::new();
    for event in events {
        let _ = write!(
            text,
            "{}  {:<8} {:<11}",
            event.timestamp.format("%Y-%m-%d %H:%M"),
            event.registration,
            event.kind.to_string()
        );
        if let Some(airport) = &event.details.nearest_airport {
            let _ = write!(text, " near {airport}");
        }
        if let Some(emergency) = &event.details.emergency {
            let _ = write!(text, " [{emergency}]");
        }
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::TrackedAircraft;
    use crate::flight::{EventDetails, EventKind};

    fn snapshot() -> PositionSnapshot {
        let mut s = PositionSnapshot::new(&TrackedAircraft::new("e0659a", "LV-FVZ"), "opensky");
        s.latitude = Some(-34.82);
        s.longitude = Some(-58.55);
        s.heading = Some(180.0);
        s.speed_kmh = Some(300.0);
        s.squawk = Some("7700".to_string());
        s
    }

    fn report(held: bool) -> CycleReport {
        CycleReport {
            timestamp: Utc::now(),
            snapshots: if held { Vec::new() } else { vec![snapshot()] },
            events: Vec::new(),
            held,
        }
    }

    #[test]
    fn test_check_output_json_shape() {
        let output = CheckOutput::new(&report(false), 4);
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["tracked"], 4);
        assert_eq!(value["airborne_count"], 1);
        assert!(value["timestamp"].is_string());
        let aircraft = &value["aircraft"][0];
        assert_eq!(aircraft["registration"], "LV-FVZ");
        assert_eq!(aircraft["nearest_airport"], "Ezeiza");
        assert_eq!(aircraft["cardinal"], "S");
        assert_eq!(aircraft["emergency"], "general emergency (7700)");
    }

    #[test]
    fn test_render_check() {
        let text = render_check(&CheckOutput::new(&report(false), 4));
        assert!(text.starts_with("1 of 4 aircraft airborne"));
        assert!(text.contains("LV-FVZ (e0659a) via opensky"));
        assert!(text.contains("near Ezeiza"));
        assert!(text.contains("heading for Mar del Plata"));
        assert!(text.contains("EMERGENCY"));
    }

    #[test]
    fn test_render_check_held() {
        let text = render_check(&CheckOutput::new(&report(true), 4));
        assert!(text.contains("state left unchanged"));
    }

    #[test]
    fn test_render_status_marks_airborne() {
        let status = StatusReport {
            tracked: vec![
                TrackedAircraft::new("e0659a", "LV-FVZ"),
                TrackedAircraft::new("e06442", "LV-FUF"),
            ],
            active: vec!["LV-FUF".to_string()],
            sources: vec!["opensky", "adsb_lol"],
            store: "sqlite:/tmp/fw.db".to_string(),
            interval_secs: 300,
        };
        let text = render_status(&status);
        assert!(text.contains("opensky -> adsb_lol"));
        assert!(text.contains("LV-FUF   e06442  airborne"));
        assert!(text.contains("LV-FVZ   e0659a  -"));
    }

    #[test]
    fn test_render_history() {
        assert_eq!(render_history(&[]), "No events recorded.\n");

        let details = EventDetails {
            nearest_airport: Some("Ezeiza".to_string()),
            ..EventDetails::default()
        };
        let events = vec![FlightEvent::new("LV-KMA", EventKind::Landing, details)];
        let text = render_history(&events);
        assert!(text.contains("LV-KMA"));
        assert!(text.contains("landing"));
        assert!(text.contains("near Ezeiza"));
    }
}
