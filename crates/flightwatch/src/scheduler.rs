//! Periodic and on-demand reconciliation.
//!
//! Both trigger paths go through one [`tokio::sync::Mutex`] around the
//! [`Reconciler`], so at most one pass is in flight at any time. A tick that
//! arrives while a pass is running waits for the gate instead of running
//! alongside it. A `check` from another process is serialized with this one
//! by the store lock each pass holds (see [`crate::storage::lock`]).
//!
//! The status query never touches the gate: the active set is published on a
//! watch channel after every pass.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::aircraft::{Fleet, TrackedAircraft};
use crate::reconciler::{CycleReport, Reconciler};

/// Read-only view of what is being watched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// The tracked fleet.
    pub tracked: Vec<TrackedAircraft>,
    /// Registrations currently believed airborne.
    pub active: Vec<String>,
    /// Configured sources, in priority order.
    pub sources: Vec<&'static str>,
    /// Where state and history are kept.
    pub store: String,
    /// Seconds between scheduled passes.
    pub interval_secs: u64,
}

/// Runs the reconciler on a fixed period and on request.
///
/// Cheap to clone; clones share the same gate.
#[derive(Debug, Clone)]
pub struct Scheduler {
    gate: Arc<Mutex<Reconciler>>,
    active: Arc<watch::Sender<BTreeSet<String>>>,
    fleet: Fleet,
    sources: Vec<&'static str>,
    store: String,
    interval: Duration,
}

impl Scheduler {
    /// Take ownership of a reconciler and run it every `interval`.
    #[must_use]
    pub fn new(reconciler: Reconciler, interval: Duration) -> Self {
        let (active, _) = watch::channel(reconciler.state().active.clone());
        Self {
            fleet: reconciler.fleet().clone(),
            sources: reconciler.source_names(),
            store: reconciler.store_description(),
            gate: Arc::new(Mutex::new(reconciler)),
            active: Arc::new(active),
            interval,
        }
    }

    /// Run one pass now, waiting for any pass already in flight.
    pub async fn check_now(&self) -> CycleReport {
        let mut reconciler = self.gate.lock().await;
        let report = reconciler.reconcile().await;
        self.active.send_replace(reconciler.state().active.clone());
        report
    }

    /// Current status, without waiting for the gate.
    #[must_use]
    pub fn status(&self) -> StatusReport {
        StatusReport {
            tracked: self.fleet.aircraft().to_vec(),
            active: self.active.borrow().iter().cloned().collect(),
            sources: self.sources.clone(),
            store: self.store.clone(),
            interval_secs: self.interval.as_secs(),
        }
    }

    /// Watch the active set as passes complete.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<String>> {
        self.active.subscribe()
    }

    /// Run passes on the schedule until `shutdown` turns true or its sender
    /// is dropped. The first pass runs immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            aircraft = self.fleet.len(),
            "Starting scheduler"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.check_now().await;
                    debug!(
                        snapshots = report.snapshots.len(),
                        events = report.events.len(),
                        held = report.held,
                        "Scheduled pass finished"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}
