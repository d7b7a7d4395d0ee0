//! Position sources and their aggregation.
//!
//! Each upstream provider is wrapped in a [`SourceAdapter`] that normalizes its
//! schema into [`PositionSnapshot`](crate::aircraft::PositionSnapshot)s. The
//! [`SourceAggregator`] queries them in priority order, falling back per
//! unresolved aircraft, and merges the results so that the first adapter to
//! resolve an aircraft wins.

pub mod adsb_lol;
pub mod opensky;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::aircraft::{Fleet, SnapshotMap, TrackedAircraft};
use crate::config::{SourceKind, SourcesConfig};
use crate::error::Result;

pub use adsb_lol::AdsbLol;
pub use opensky::OpenSky;

/// A provider of live aircraft positions.
///
/// Implementations return snapshots only for aircraft the provider currently
/// sees. Aircraft it does not see are absent from the map, not an error;
/// errors are reserved for transport or decoding failures.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The name of this source (for logging and snapshots).
    fn name(&self) -> &'static str;

    /// Upper bound for a single request to this source.
    fn timeout(&self) -> Duration;

    /// Upper bound for one [`fetch`](Self::fetch) over a batch of the given
    /// size.
    ///
    /// Sources that answer for the whole batch in one request keep the
    /// default; sources that issue one request per aircraft scale it.
    fn budget(&self, _count: usize) -> Duration {
        self.timeout()
    }

    /// Query the provider for the given aircraft.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, answers with a
    /// non-success status or returns a malformed payload.
    async fn fetch(&self, aircraft: &[TrackedAircraft]) -> Result<SnapshotMap>;
}

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Merged snapshots keyed by transponder address.
    pub snapshots: SnapshotMap,
    /// Number of adapter calls made.
    pub attempts: usize,
    /// Number of adapter calls that failed.
    pub failures: usize,
}

impl Aggregation {
    /// Check if calls were made and every one of them failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.attempts > 0 && self.failures == self.attempts
    }
}

/// Runs source adapters in priority order and merges their results.
pub struct SourceAggregator {
    adapters: Vec<Box<dyn SourceAdapter>>,
    fallback_delay: Duration,
}

impl std::fmt::Debug for SourceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAggregator")
            .field("adapters", &self.source_names())
            .field("fallback_delay", &self.fallback_delay)
            .finish()
    }
}

impl SourceAggregator {
    /// Create an aggregator over adapters ordered primary first.
    ///
    /// `fallback_delay` is slept between consecutive fallback calls.
    #[must_use]
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>, fallback_delay: Duration) -> Self {
        Self {
            adapters,
            fallback_delay,
        }
    }

    /// Build the aggregator described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::with_capacity(config.order.len());
        for kind in &config.order {
            match kind {
                SourceKind::Opensky => adapters.push(Box::new(OpenSky::new(&config.opensky)?)),
                SourceKind::AdsbLol => adapters.push(Box::new(AdsbLol::new(&config.adsb_lol)?)),
            }
        }
        Ok(Self::new(
            adapters,
            Duration::from_millis(config.fallback_delay_ms),
        ))
    }

    /// Names of the configured sources, in priority order.
    #[must_use]
    pub fn source_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Resolve as many tracked aircraft as possible.
    ///
    /// The primary adapter is asked once for the whole fleet. If anything is
    /// left unresolved, each remaining adapter is asked for each unresolved
    /// aircraft in turn until everything resolves or the adapters run out.
    /// Failures are logged and count as "nothing found".
    pub async fn aggregate(&self, fleet: &Fleet) -> Aggregation {
        let mut result = Aggregation::default();
        let Some((primary, fallbacks)) = self.adapters.split_first() else {
            warn!("No position sources configured");
            return result;
        };

        Self::call(primary.as_ref(), fleet.aircraft(), &mut result).await;
        if result.snapshots.len() == fleet.len() {
            debug!("Primary source {} resolved the whole fleet", primary.name());
            return result;
        }

        let mut first_fallback_call = true;
        for adapter in fallbacks {
            for aircraft in fleet.aircraft() {
                if result.snapshots.contains_key(&aircraft.icao24) {
                    continue;
                }
                if !first_fallback_call && !self.fallback_delay.is_zero() {
                    tokio::time::sleep(self.fallback_delay).await;
                }
                first_fallback_call = false;
                Self::call(adapter.as_ref(), std::slice::from_ref(aircraft), &mut result).await;
            }
            if result.snapshots.len() == fleet.len() {
                break;
            }
        }

        info!(
            "Aggregation resolved {}/{} aircraft ({} calls, {} failed)",
            result.snapshots.len(),
            fleet.len(),
            result.attempts,
            result.failures
        );
        result
    }

    /// Call one adapter and merge what it found without overriding earlier
    /// sources.
    async fn call(
        adapter: &dyn SourceAdapter,
        aircraft: &[TrackedAircraft],
        result: &mut Aggregation,
    ) {
        result.attempts += 1;
        let budget = adapter.budget(aircraft.len());
        let found = match tokio::time::timeout(budget, adapter.fetch(aircraft)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!("Source {} failed: {}", adapter.name(), e);
                result.failures += 1;
                return;
            }
            Err(_) => {
                warn!("Source {} timed out after {:?}", adapter.name(), budget);
                result.failures += 1;
                return;
            }
        };

        for (icao24, snapshot) in found {
            let requested = aircraft.iter().any(|a| a.icao24 == icao24);
            if requested && !result.snapshots.contains_key(&icao24) {
                debug!("{} resolved by {}", snapshot.registration, adapter.name());
                result.snapshots.insert(icao24, snapshot);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::aircraft::PositionSnapshot;
    use crate::error::Error;

    /// A scripted source that records every call made to it.
    #[derive(Debug, Clone)]
    pub(crate) struct FakeSource {
        pub name: &'static str,
        pub sees: Arc<Mutex<HashSet<String>>>,
        pub fail: bool,
        pub delay: Duration,
        pub squawk: Option<&'static str>,
        pub calls: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl FakeSource {
        pub(crate) fn new(name: &'static str, sees: &[&str]) -> Self {
            Self {
                name,
                sees: Arc::new(Mutex::new(sees.iter().map(ToString::to_string).collect())),
                fail: false,
                delay: Duration::ZERO,
                squawk: None,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn failing(name: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, &[])
            }
        }

        pub(crate) fn set_seen(&self, sees: &[&str]) {
            *self.sees.lock().unwrap() = sees.iter().map(ToString::to_string).collect();
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl SourceAdapter for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn fetch(&self, aircraft: &[TrackedAircraft]) -> Result<SnapshotMap> {
            self.calls
                .lock()
                .unwrap()
                .push(aircraft.iter().map(|a| a.icao24.clone()).collect());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(Error::source_request(self.name, "connection refused"));
            }
            let sees = self.sees.lock().unwrap().clone();
            Ok(aircraft
                .iter()
                .filter(|a| sees.contains(&a.icao24))
                .map(|a| {
                    let mut snapshot = PositionSnapshot::new(a, self.name);
                    snapshot.latitude = Some(-34.82);
                    snapshot.longitude = Some(-58.55);
                    snapshot.heading = Some(180.0);
                    snapshot.speed_kmh = Some(300.0);
                    snapshot.squawk = self.squawk.map(ToString::to_string);
                    (a.icao24.clone(), snapshot)
                })
                .collect())
        }
    }

    pub(crate) fn test_fleet() -> Fleet {
        Fleet::new(vec![
            TrackedAircraft::new("e0659a", "LV-FVZ"),
            TrackedAircraft::new("e06442", "LV-FUF"),
            TrackedAircraft::new("e07a1c", "LV-KMA"),
        ])
    }

    fn aggregator(sources: &[FakeSource]) -> SourceAggregator {
        aggregator_with_delay(sources, Duration::ZERO)
    }

    fn aggregator_with_delay(sources: &[FakeSource], delay: Duration) -> SourceAggregator {
        SourceAggregator::new(
            sources
                .iter()
                .map(|s| Box::new(s.clone()) as Box<dyn SourceAdapter>)
                .collect(),
            delay,
        )
    }

    #[tokio::test]
    async fn test_primary_resolves_all_skips_fallbacks() {
        let primary = FakeSource::new("primary", &["e0659a", "e06442", "e07a1c"]);
        let fallback = FakeSource::new("fallback", &["e0659a"]);
        let agg = aggregator(&[primary.clone(), fallback.clone()]);

        let result = agg.aggregate(&test_fleet()).await;

        assert_eq!(result.snapshots.len(), 3);
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 0);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.failures, 0);
    }

    #[tokio::test]
    async fn test_fallback_only_for_unresolved() {
        let primary = FakeSource::new("primary", &["e0659a"]);
        let fallback = FakeSource::new("fallback", &["e0659a", "e06442"]);
        let agg = aggregator(&[primary.clone(), fallback.clone()]);

        let result = agg.aggregate(&test_fleet()).await;

        assert_eq!(result.snapshots.len(), 2);
        assert_eq!(result.snapshots["e0659a"].source, "primary");
        assert_eq!(result.snapshots["e06442"].source, "fallback");

        let calls = fallback.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![vec!["e06442".to_string()], vec!["e07a1c".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_first_source_wins() {
        let primary = FakeSource::new("primary", &[]);
        let second = FakeSource::new("second", &["e0659a"]);
        let third = FakeSource::new("third", &["e0659a", "e06442", "e07a1c"]);
        let agg = aggregator(&[primary, second, third.clone()]);

        let result = agg.aggregate(&test_fleet()).await;

        assert_eq!(result.snapshots["e0659a"].source, "second");
        assert_eq!(result.snapshots["e06442"].source, "third");
        // The third source is never asked about the aircraft the second resolved.
        let asked: Vec<String> = third.calls.lock().unwrap().concat();
        assert!(!asked.contains(&"e0659a".to_string()));
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back() {
        let primary = FakeSource::failing("primary");
        let fallback = FakeSource::new("fallback", &["e0659a", "e06442", "e07a1c"]);
        let agg = aggregator(&[primary, fallback]);

        let result = agg.aggregate(&test_fleet()).await;

        assert_eq!(result.snapshots.len(), 3);
        assert_eq!(result.failures, 1);
        assert!(!result.all_failed());
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_empty() {
        let agg = aggregator(&[FakeSource::failing("a"), FakeSource::failing("b")]);

        let result = agg.aggregate(&test_fleet()).await;

        assert!(result.snapshots.is_empty());
        assert_eq!(result.attempts, 4);
        assert!(result.all_failed());
    }

    #[tokio::test]
    async fn test_nothing_flying_is_not_a_failure() {
        let agg = aggregator(&[FakeSource::new("a", &[])]);
        let result = agg.aggregate(&test_fleet()).await;
        assert!(result.snapshots.is_empty());
        assert!(!result.all_failed());
    }

    #[tokio::test]
    async fn test_no_sources() {
        let agg = aggregator(&[]);
        let result = agg.aggregate(&test_fleet()).await;
        assert_eq!(result, Aggregation::default());
        assert!(!result.all_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let mut slow = FakeSource::new("slow", &["e0659a"]);
        slow.delay = Duration::from_secs(5);
        let agg = aggregator(&[slow]);

        let result = agg.aggregate(&test_fleet()).await;

        assert!(result.snapshots.is_empty());
        assert_eq!(result.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_calls_are_spaced_by_delay() {
        let primary = FakeSource::new("primary", &[]);
        let fallback = FakeSource::new("fallback", &["e0659a", "e06442", "e07a1c"]);
        let agg = aggregator_with_delay(&[primary, fallback.clone()], Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        let result = agg.aggregate(&test_fleet()).await;

        assert_eq!(result.snapshots.len(), 3);
        assert_eq!(fallback.call_count(), 3);
        // No pause before the first fallback call, one before each later one.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_spans_every_fallback_adapter() {
        let primary = FakeSource::new("primary", &[]);
        let second = FakeSource::new("second", &["e0659a"]);
        let third = FakeSource::new("third", &["e06442", "e07a1c"]);
        let agg = aggregator_with_delay(
            &[primary, second.clone(), third.clone()],
            Duration::from_millis(500),
        );

        let start = tokio::time::Instant::now();
        let result = agg.aggregate(&test_fleet()).await;

        assert_eq!(result.snapshots.len(), 3);
        let calls = second.call_count() + third.call_count();
        assert_eq!(calls, 5);
        assert_eq!(start.elapsed(), Duration::from_millis(500) * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_short_circuit_never_sleeps() {
        let primary = FakeSource::new("primary", &["e0659a", "e06442", "e07a1c"]);
        let fallback = FakeSource::new("fallback", &["e0659a"]);
        let agg = aggregator_with_delay(&[primary, fallback.clone()], Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        agg.aggregate(&test_fleet()).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(fallback.call_count(), 0);
    }

    #[test]
    fn test_source_names_in_order() {
        let agg = aggregator(&[FakeSource::new("opensky", &[]), FakeSource::new("adsb_lol", &[])]);
        assert_eq!(agg.source_names(), vec!["opensky", "adsb_lol"]);
        assert!(format!("{agg:?}").contains("opensky"));
    }
}
