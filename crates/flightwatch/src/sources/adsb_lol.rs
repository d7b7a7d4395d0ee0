//! ADSB.lol community feed.
//!
//! `GET /v2/hex/<icao24>` answers with the aircraft currently seen for one
//! transponder address, in the readsb JSON layout (feet, knots, ft/min).
//! A batch is one request per aircraft; a failed request only loses that
//! aircraft.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{trace, warn};

use crate::aircraft::{PositionSnapshot, SnapshotMap, TrackedAircraft};
use crate::config::AdsbLolConfig;
use crate::error::{Error, Result};

use super::SourceAdapter;

const NAME: &str = "adsb_lol";

const FT_TO_M: f64 = 0.3048;
const KT_TO_KMH: f64 = 1.852;

#[derive(Debug, Deserialize)]
struct HexResponse {
    #[serde(default)]
    ac: Vec<AircraftRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AircraftRecord {
    hex: String,
    flight: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    /// Feet, or the string `"ground"`.
    alt_baro: Option<Value>,
    alt_geom: Option<f64>,
    gs: Option<f64>,
    track: Option<f64>,
    baro_rate: Option<f64>,
    geom_rate: Option<f64>,
    squawk: Option<String>,
}

/// Client for the ADSB.lol API.
#[derive(Debug, Clone)]
pub struct AdsbLol {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl AdsbLol {
    /// Create a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &AdsbLolConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flightwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::source_request(NAME, e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn fetch_one(&self, aircraft: &TrackedAircraft) -> Result<Option<PositionSnapshot>> {
        let url = format!("{}/v2/hex/{}", self.base_url, aircraft.icao24);
        trace!("Fetching {}", url);

        let body = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::from_reqwest(NAME, &e))?
            .text()
            .await
            .map_err(|e| Error::from_reqwest(NAME, &e))?;

        parse_hex_response(&body, aircraft)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for AdsbLol {
    fn name(&self) -> &'static str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn budget(&self, count: usize) -> Duration {
        let requests = u32::try_from(count.max(1)).unwrap_or(u32::MAX);
        self.timeout.saturating_mul(requests)
    }

    async fn fetch(&self, aircraft: &[TrackedAircraft]) -> Result<SnapshotMap> {
        fetch_each(aircraft, self.timeout, move |tracked| async move {
            self.fetch_one(&tracked).await
        })
        .await
    }
}

/// Look up each aircraft with its own request and `timeout`.
///
/// A failed lookup is logged and skipped. The batch only fails when every
/// lookup failed, with the last error.
async fn fetch_each<F, Fut>(
    aircraft: &[TrackedAircraft],
    timeout: Duration,
    mut fetch_one: F,
) -> Result<SnapshotMap>
where
    F: FnMut(TrackedAircraft) -> Fut,
    Fut: Future<Output = Result<Option<PositionSnapshot>>>,
{
    let mut snapshots = SnapshotMap::new();
    let mut failures = 0;
    let mut last_error = None;

    for tracked in aircraft {
        let outcome = tokio::time::timeout(timeout, fetch_one(tracked.clone()))
            .await
            .unwrap_or_else(|_| {
                Err(Error::source_request(
                    NAME,
                    format!("timed out after {timeout:?}"),
                ))
            });
        match outcome {
            Ok(Some(snapshot)) => {
                snapshots.insert(tracked.icao24.clone(), snapshot);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Lookup of {} failed, skipping: {}", tracked.registration, e);
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if failures == aircraft.len() => Err(e),
        _ => Ok(snapshots),
    }
}

/// Decode a `/v2/hex` body for one tracked aircraft.
///
/// Returns `None` when the feed does not currently see the aircraft.
///
/// # Errors
///
/// Returns an error if the body is not a valid response document.
pub fn parse_hex_response(
    body: &str,
    aircraft: &TrackedAircraft,
) -> Result<Option<PositionSnapshot>> {
    let response: HexResponse =
        serde_json::from_str(body).map_err(|e| Error::source_decode(NAME, e.to_string()))?;

    let Some(record) = response
        .ac
        .into_iter()
        .find(|r| r.hex.trim().eq_ignore_ascii_case(&aircraft.icao24))
    else {
        return Ok(None);
    };

    let on_ground = matches!(&record.alt_baro, Some(Value::String(s)) if s == "ground");
    let alt_baro_ft = record.alt_baro.as_ref().and_then(Value::as_f64);

    let mut snapshot = PositionSnapshot::new(aircraft, NAME);
    snapshot.callsign = record
        .flight
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    snapshot.latitude = record.lat;
    snapshot.longitude = record.lon;
    snapshot.altitude_m = if on_ground {
        Some(0.0)
    } else {
        record
            .alt_geom
            .or(alt_baro_ft)
            .map(|ft| (ft * FT_TO_M).round())
    };
    snapshot.speed_kmh = record.gs.map(|kt| (kt * KT_TO_KMH * 10.0).round() / 10.0);
    snapshot.heading = record.track;
    snapshot.vertical_rate_fpm = record.baro_rate.or(record.geom_rate);
    snapshot.squawk = record
        .squawk
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(Some(snapshot))
}
