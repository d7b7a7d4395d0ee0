//! Flight state reconciliation.
//!
//! Each pass compares the aggregated snapshot with the persisted
//! [`FlightState`] and walks every tracked registration through
//! `grounded -> airborne (new) -> airborne (notified) -> grounded`:
//!
//! - present now, not active before: `takeoff`, or `in_progress` when the
//!   episode was already alerted for (a coverage gap, or a restart midway
//!   through a pass);
//! - active before, absent now: `landing`, which also ends the episode.
//!
//! State is persisted after every transition and once more after `active` is
//! replaced. A [`Reconciler`] is not internally synchronized; callers share it
//! behind one mutex (see [`crate::scheduler`]). Across processes, each pass
//! holds the store's [`StoreLock`] and starts from the persisted state, so a
//! `check` run next to a running daemon never repeats or loses a transition.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aircraft::{Fleet, PositionSnapshot};
use crate::airports::AIRPORTS;
use crate::config::Config;
use crate::error::Result;
use crate::flight::{EventDetails, EventKind, FlightEvent, FlightState};
use crate::geo::{self, AirportFix, Cardinal, Emergency, VerticalTrend};
use crate::notify::{self, Notifier};
use crate::sources::SourceAggregator;
use crate::storage::{self, FlightStore, StoreLock};

/// Derived context for one airborne snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightContext {
    /// Closest airport to the current position.
    pub nearest: Option<AirportFix>,
    /// Airport the aircraft is heading towards.
    pub destination: Option<AirportFix>,
    /// Minutes to the nearest airport at the current ground speed.
    pub eta_nearest_min: Option<i64>,
    /// Minutes to the destination at the current ground speed.
    pub eta_destination_min: Option<i64>,
    /// Compass point of the heading.
    pub cardinal: Option<Cardinal>,
    /// Climbing, descending or level.
    pub trend: VerticalTrend,
    /// Emergency squawk classification.
    pub emergency: Emergency,
}

impl FlightContext {
    /// Enrich a snapshot against the static airport set.
    #[must_use]
    pub fn from_snapshot(snapshot: &PositionSnapshot) -> Self {
        let position = snapshot.position();
        let nearest = position.and_then(|p| geo::nearest_airport(p, AIRPORTS));
        let destination = position
            .zip(snapshot.heading)
            .and_then(|(p, heading)| geo::destination_airport(p, heading, AIRPORTS));

        Self {
            nearest,
            destination,
            eta_nearest_min: nearest
                .and_then(|fix| geo::eta_minutes(fix.distance_km, snapshot.speed_kmh)),
            eta_destination_min: destination
                .and_then(|fix| geo::eta_minutes(fix.distance_km, snapshot.speed_kmh)),
            cardinal: snapshot.heading.map(Cardinal::from_heading),
            trend: VerticalTrend::from_rate(snapshot.vertical_rate_fpm),
            emergency: Emergency::from_squawk(snapshot.squawk.as_deref()),
        }
    }

    /// The payload stored with the event.
    #[must_use]
    pub fn details(&self, snapshot: &PositionSnapshot) -> EventDetails {
        EventDetails {
            altitude_m: snapshot.altitude_m,
            speed_kmh: snapshot.speed_kmh,
            latitude: snapshot.latitude,
            longitude: snapshot.longitude,
            source: Some(snapshot.source.clone()),
            nearest_airport: self.nearest.map(|fix| fix.airport.name.to_string()),
            destination_airport: self.destination.map(|fix| fix.airport.name.to_string()),
            emergency: self
                .emergency
                .is_emergency()
                .then(|| self.emergency.to_string()),
        }
    }
}

/// What one reconciliation pass saw and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// When the pass finished aggregating.
    pub timestamp: DateTime<Utc>,
    /// Aircraft reported airborne this pass.
    pub snapshots: Vec<PositionSnapshot>,
    /// Events recorded this pass, in emission order.
    pub events: Vec<FlightEvent>,
    /// The pass left state untouched because no source answered.
    pub held: bool,
}

/// Decide the transitions for one pass.
///
/// Airborne transitions come first, then landings, each in registration
/// order.
#[must_use]
pub fn plan_transitions(
    state: &FlightState,
    flying: &BTreeSet<String>,
) -> Vec<(String, EventKind)> {
    let airborne = flying.difference(&state.active).map(|registration| {
        let kind = if state.is_notified(registration) {
            EventKind::InProgress
        } else {
            EventKind::Takeoff
        };
        (registration.clone(), kind)
    });
    let landed = state
        .active
        .difference(flying)
        .map(|registration| (registration.clone(), EventKind::Landing));

    airborne.chain(landed).collect()
}

/// Alert text for a takeoff or in-progress transition.
#[must_use]
pub fn format_airborne_alert(
    kind: EventKind,
    snapshot: &PositionSnapshot,
    context: &FlightContext,
    at: DateTime<Utc>,
) -> String {
    let headline = match kind {
        EventKind::InProgress => "is airborne again",
        _ => "took off",
    };
    let mut lines = vec![format!("✈️ {} {}", snapshot.registration, headline)];

    if let Some(callsign) = &snapshot.callsign {
        lines.push(format!("Callsign: {callsign}"));
    }
    lines.push(format!(
        "Altitude: {}",
        or_unknown(snapshot.altitude_m.map(|m| format!("{m:.0} m")))
    ));
    lines.push(format!(
        "Speed: {}",
        or_unknown(snapshot.speed_kmh.map(|s| format!("{s:.1} km/h")))
    ));
    lines.push(format!(
        "Heading: {}",
        or_unknown(
            snapshot
                .heading
                .zip(context.cardinal)
                .map(|(h, c)| format!("{h:.0}° ({c})"))
        )
    ));
    lines.push(format!("Vertical: {}", context.trend));
    lines.push(format!(
        "Position: {}",
        or_unknown(
            snapshot
                .position()
                .map(|p| format!("{:.4}, {:.4}", p.latitude, p.longitude))
        )
    ));
    if let Some(country) = &snapshot.origin_country {
        lines.push(format!("Country: {country}"));
    }
    if let Some(fix) = context.nearest {
        lines.push(format!(
            "Nearest airport: {}",
            describe_fix(fix, context.eta_nearest_min)
        ));
    }
    if let Some(fix) = context.destination {
        lines.push(format!(
            "Destination: {}",
            describe_fix(fix, context.eta_destination_min)
        ));
    }
    if context.emergency.is_emergency() {
        lines.push(format!("⚠️ EMERGENCY: {}", context.emergency));
    }
    lines.push(format!("Source: {}", snapshot.source));
    lines.push(format!("Time: {}", at.format("%Y-%m-%d %H:%M:%S UTC")));

    lines.join("\n")
}

/// Alert text for a landing, with the last known context when available.
#[must_use]
pub fn format_landing_alert(
    registration: &str,
    last_seen: Option<&PositionSnapshot>,
    at: DateTime<Utc>,
) -> String {
    let mut lines = vec![format!("🛬 {registration} is no longer airborne")];
    let last_fix = last_seen
        .and_then(PositionSnapshot::position)
        .and_then(|p| geo::nearest_airport(p, AIRPORTS));
    if let Some(fix) = last_fix {
        lines.push(format!("Last seen near: {}", describe_fix(fix, None)));
    }
    lines.push(format!("Time: {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    lines.join("\n")
}

/// Send an alert; a failure is logged and otherwise ignored.
async fn deliver(notifier: &dyn Notifier, text: &str) {
    if let Err(e) = notifier.send(text).await {
        warn!(error = %e, notifier = notifier.name(), "Alert not delivered");
    }
}

/// Take the store's cross-process lock, if it has one.
async fn lock_store(path: Option<PathBuf>) -> Result<Option<StoreLock>> {
    match path {
        Some(path) => Ok(Some(StoreLock::acquire(path).await?)),
        None => Ok(None),
    }
}

fn describe_fix(fix: AirportFix, eta_min: Option<i64>) -> String {
    let mut text = format!(
        "{} ({}), {:.1} km",
        fix.airport.name, fix.airport.code, fix.distance_km
    );
    if let Some(eta) = eta_min {
        text.push_str(&format!(", ETA {eta} min"));
    }
    text
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| "unknown".to_string())
}

/// Owns the flight state and runs reconciliation passes over it.
#[derive(Debug)]
pub struct Reconciler {
    fleet: Fleet,
    aggregator: SourceAggregator,
    store: Box<dyn FlightStore>,
    notifier: Arc<dyn Notifier>,
    state: FlightState,
    /// Latest snapshot per active registration; not persisted.
    last_seen: BTreeMap<String, PositionSnapshot>,
    hold_on_source_outage: bool,
}

impl Reconciler {
    /// Create a reconciler, loading the persisted state from `store`.
    #[must_use]
    pub fn new(
        fleet: Fleet,
        aggregator: SourceAggregator,
        store: Box<dyn FlightStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let state = store.load_state();
        info!(
            "Loaded state from {}: {} active, {} notified",
            store.describe(),
            state.active.len(),
            state.notified.len()
        );
        Self {
            fleet,
            aggregator,
            store,
            notifier,
            state,
            last_seen: BTreeMap::new(),
            hold_on_source_outage: false,
        }
    }

    /// Build a reconciler with the sources, store and notifier described by
    /// the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or a client cannot be
    /// built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let aggregator = SourceAggregator::from_config(&config.sources)?;
        let store = storage::open_store(config)?;
        let notifier = notify::from_config(&config.notify)?;
        Ok(Self::new(config.fleet(), aggregator, store, notifier)
            .with_hold_on_source_outage(config.reconciler.hold_on_source_outage))
    }

    /// Skip passes in which every source call failed.
    #[must_use]
    pub fn with_hold_on_source_outage(mut self, hold: bool) -> Self {
        self.hold_on_source_outage = hold;
        self
    }

    /// The tracked fleet.
    #[must_use]
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// The persisted state as of the latest pass.
    #[must_use]
    pub fn state(&self) -> &FlightState {
        &self.state
    }

    /// Names of the configured sources, in priority order.
    #[must_use]
    pub fn source_names(&self) -> Vec<&'static str> {
        self.aggregator.source_names()
    }

    /// Location of the backing store.
    #[must_use]
    pub fn store_description(&self) -> String {
        self.store.describe()
    }

    /// Run one full pass: lock, reload, aggregate, transition, persist.
    ///
    /// Never fails. Problems are logged, and the next pass retries from
    /// whatever state was persisted.
    pub async fn reconcile(&mut self) -> CycleReport {
        let _lock = match lock_store(self.store.lock_path()).await {
            Ok(lock) => lock,
            Err(e) => {
                warn!(error = %e, "Could not lock the store, skipping this pass");
                return Self::held(Utc::now());
            }
        };
        self.state = self.store.load_state();

        let aggregation = self.aggregator.aggregate(&self.fleet).await;
        let timestamp = Utc::now();

        if aggregation.attempts == 0 {
            warn!("No source was queried, keeping previous state");
            return Self::held(timestamp);
        }
        if self.hold_on_source_outage && aggregation.all_failed() {
            warn!(
                failures = aggregation.failures,
                "Every source failed, keeping previous state"
            );
            return Self::held(timestamp);
        }

        let current: BTreeMap<String, PositionSnapshot> = aggregation
            .snapshots
            .into_values()
            .map(|s| (s.registration.clone(), s))
            .collect();
        let flying: BTreeSet<String> = current.keys().cloned().collect();

        let mut events = Vec::new();
        for (registration, kind) in plan_transitions(&self.state, &flying) {
            let event = if kind == EventKind::Landing {
                self.land(&registration, timestamp).await
            } else {
                let Some(snapshot) = current.get(&registration) else {
                    continue;
                };
                self.take_off(kind, snapshot, timestamp).await
            };
            events.push(event);
        }

        self.state.active = flying;
        self.persist();
        self.last_seen = current.clone();

        info!(
            airborne = self.state.active.len(),
            events = events.len(),
            "Reconciliation complete"
        );
        CycleReport {
            timestamp,
            snapshots: current.into_values().collect(),
            events,
            held: false,
        }
    }

    async fn take_off(
        &mut self,
        kind: EventKind,
        snapshot: &PositionSnapshot,
        at: DateTime<Utc>,
    ) -> FlightEvent {
        let context = FlightContext::from_snapshot(snapshot);
        info!("{} {}", snapshot.registration, kind);

        let notifier = Arc::clone(&self.notifier);
        deliver(notifier.as_ref(), &format_airborne_alert(kind, snapshot, &context, at)).await;
        let event = FlightEvent {
            registration: snapshot.registration.clone(),
            kind,
            timestamp: at,
            details: context.details(snapshot),
        };
        self.record(&event);

        self.state.notified.insert(snapshot.registration.clone());
        self.persist();
        event
    }

    async fn land(&mut self, registration: &str, at: DateTime<Utc>) -> FlightEvent {
        let last = self.last_seen.get(registration).cloned();
        info!("{} landing", registration);

        let notifier = Arc::clone(&self.notifier);
        deliver(notifier.as_ref(), &format_landing_alert(registration, last.as_ref(), at)).await;
        let details = last
            .as_ref()
            .map(|s| FlightContext::from_snapshot(s).details(s))
            .unwrap_or_default();
        let event = FlightEvent {
            registration: registration.to_string(),
            kind: EventKind::Landing,
            timestamp: at,
            details,
        };
        self.record(&event);

        self.state.notified.remove(registration);
        self.persist();
        event
    }

    fn record(&self, event: &FlightEvent) {
        if let Err(e) = self.store.append_event(event) {
            warn!(
                error = %e,
                "Could not append {} event for {}", event.kind, event.registration
            );
        }
    }

    fn persist(&self) {
        match self.store.save_state(&self.state) {
            Ok(()) => debug!("State persisted"),
            Err(e) => warn!(error = %e, "Could not persist flight state"),
        }
    }

    fn held(timestamp: DateTime<Utc>) -> CycleReport {
        CycleReport {
            timestamp,
            snapshots: Vec::new(),
            events: Vec::new(),
            held: true,
        }
    }
}
