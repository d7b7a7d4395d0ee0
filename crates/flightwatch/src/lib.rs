//! `flightwatch` - Fleet flight-state watcher
//!
//! Polls public ADS-B position feeds for a fixed set of aircraft, detects
//! takeoffs and landings across polling cycles, enriches them with airport
//! context, and sends an alert for each transition.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod aircraft;
pub mod airports;
pub mod cli;
pub mod config;
pub mod error;
pub mod flight;
pub mod geo;
pub mod logging;
pub mod notify;
pub mod reconciler;
pub mod scheduler;
pub mod sources;
pub mod storage;

pub use aircraft::{Fleet, PositionSnapshot, TrackedAircraft};
pub use config::Config;
pub use error::{Error, Result};
pub use flight::{EventKind, FlightEvent, FlightState};
pub use logging::init_logging;
pub use notify::Notifier;
pub use reconciler::{CycleReport, Reconciler};
pub use scheduler::{Scheduler, StatusReport};
pub use sources::{SourceAdapter, SourceAggregator};
pub use storage::{open_store, FlightStore};
