//! OpenSky Network state vectors.
//!
//! `GET /states/all?icao24=..&icao24=..` returns every requested aircraft the
//! network currently sees in a single call, as positional arrays:
//!
//! | index | field            | unit |
//! |-------|------------------|------|
//! | 0     | icao24           |      |
//! | 1     | callsign         |      |
//! | 2     | origin country   |      |
//! | 5     | longitude        | deg  |
//! | 6     | latitude         | deg  |
//! | 7     | baro altitude    | m    |
//! | 9     | velocity         | m/s  |
//! | 10    | true track       | deg  |
//! | 11    | vertical rate    | m/s  |
//! | 13    | geo altitude     | m    |
//! | 14    | squawk           |      |

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::aircraft::{PositionSnapshot, SnapshotMap, TrackedAircraft};
use crate::config::OpenSkyConfig;
use crate::error::{Error, Result};

use super::SourceAdapter;

const NAME: &str = "opensky";

/// Shortest state vector we accept.
const MIN_STATE_LEN: usize = 14;

const MS_TO_KMH: f64 = 3.6;
const MS_TO_FPM: f64 = 196.850_393_7;

#[derive(Debug, Deserialize)]
struct StatesResponse {
    #[serde(default)]
    states: Option<Vec<Vec<Value>>>,
}

/// Client for the OpenSky Network REST API.
#[derive(Debug, Clone)]
pub struct OpenSky {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    timeout: Duration,
}

impl OpenSky {
    /// Create a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &OpenSkyConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flightwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::source_request(NAME, e.to_string()))?;
        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for OpenSky {
    fn name(&self) -> &'static str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, aircraft: &[TrackedAircraft]) -> Result<SnapshotMap> {
        if aircraft.is_empty() {
            return Ok(SnapshotMap::new());
        }

        let url = format!("{}/states/all", self.base_url);
        let query: Vec<(&str, &str)> = aircraft
            .iter()
            .map(|a| ("icao24", a.icao24.as_str()))
            .collect();
        trace!("Fetching {} with {} ids", url, query.len());

        let mut request = self.client.get(&url).query(&query);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let body = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::from_reqwest(NAME, &e))?
            .text()
            .await
            .map_err(|e| Error::from_reqwest(NAME, &e))?;

        let snapshots = parse_states(&body, aircraft)?;
        debug!("OpenSky reported {} of {} aircraft", snapshots.len(), aircraft.len());
        Ok(snapshots)
    }
}

fn field_f64(state: &[Value], index: usize) -> Option<f64> {
    state.get(index).and_then(Value::as_f64)
}

fn field_str(state: &[Value], index: usize) -> Option<String> {
    state
        .get(index)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Decode a `/states/all` body into snapshots for the requested aircraft.
///
/// Vectors shorter than 14 fields or for aircraft not requested are skipped.
///
/// # Errors
///
/// Returns an error if the body is not a valid states document.
pub fn parse_states(body: &str, aircraft: &[TrackedAircraft]) -> Result<SnapshotMap> {
    let response: StatesResponse =
        serde_json::from_str(body).map_err(|e| Error::source_decode(NAME, e.to_string()))?;

    let mut snapshots = SnapshotMap::new();
    for state in response.states.unwrap_or_default() {
        if state.len() < MIN_STATE_LEN {
            continue;
        }
        let Some(icao24) = field_str(&state, 0).map(|s| s.to_ascii_lowercase()) else {
            continue;
        };
        let Some(tracked) = aircraft.iter().find(|a| a.icao24 == icao24) else {
            continue;
        };

        let mut snapshot = PositionSnapshot::new(tracked, NAME);
        snapshot.callsign = field_str(&state, 1);
        snapshot.origin_country = field_str(&state, 2);
        snapshot.longitude = field_f64(&state, 5);
        snapshot.latitude = field_f64(&state, 6);
        snapshot.altitude_m = field_f64(&state, 13).or_else(|| field_f64(&state, 7));
        snapshot.speed_kmh = field_f64(&state, 9).map(|v| (v * MS_TO_KMH * 10.0).round() / 10.0);
        snapshot.heading = field_f64(&state, 10);
        snapshot.vertical_rate_fpm = field_f64(&state, 11).map(|v| (v * MS_TO_FPM).round());
        snapshot.squawk = field_str(&state, 14);

        snapshots.insert(icao24, snapshot);
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "time": 1718000000,
        "states": [
            ["e0659a", "LVFVZ   ", "Argentina", 1718000000, 1718000000,
             -58.55, -34.82, 1200.0, false, 83.33, 180.0, 5.2, null, 1250.0, "7700", false, 0],
            ["e06442", "LVFUF", "Argentina", 1718000000, 1718000000,
             null, null, null, true, 0.0, null, null, null, null, null, false, 0],
            ["abcdef", "OTHER", "Chile", 1718000000, 1718000000,
             -70.0, -33.0, 9000.0, false, 230.0, 10.0, 0.0, null, 9100.0, "1234", false, 0],
            ["e07a1c", "SHORT"]
        ]
    }"#;

    fn fleet() -> Vec<TrackedAircraft> {
        vec![
            TrackedAircraft::new("e0659a", "LV-FVZ"),
            TrackedAircraft::new("e06442", "LV-FUF"),
            TrackedAircraft::new("e07a1c", "LV-KMA"),
        ]
    }

    #[test]
    fn test_parse_states_normalizes_units() {
        let snapshots = parse_states(BODY, &fleet()).unwrap();
        let fvz = &snapshots["e0659a"];

        assert_eq!(fvz.registration, "LV-FVZ");
        assert_eq!(fvz.callsign.as_deref(), Some("LVFVZ"));
        assert_eq!(fvz.origin_country.as_deref(), Some("Argentina"));
        assert_eq!(fvz.latitude, Some(-34.82));
        assert_eq!(fvz.longitude, Some(-58.55));
        assert_eq!(fvz.altitude_m, Some(1250.0));
        assert_eq!(fvz.speed_kmh, Some(300.0));
        assert_eq!(fvz.heading, Some(180.0));
        assert_eq!(fvz.vertical_rate_fpm, Some(1024.0));
        assert_eq!(fvz.squawk.as_deref(), Some("7700"));
        assert_eq!(fvz.source, "opensky");
    }

    #[test]
    fn test_parse_states_keeps_positionless_aircraft() {
        let snapshots = parse_states(BODY, &fleet()).unwrap();
        let fuf = &snapshots["e06442"];
        assert!(fuf.position().is_none());
        assert!(fuf.altitude_m.is_none());
    }

    #[test]
    fn test_parse_states_filters_untracked_and_short() {
        let snapshots = parse_states(BODY, &fleet()).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert!(!snapshots.contains_key("abcdef"));
        assert!(!snapshots.contains_key("e07a1c"));
    }

    #[test]
    fn test_parse_states_null_states() {
        let snapshots = parse_states(r#"{"time": 1, "states": null}"#, &fleet()).unwrap();
        assert!(snapshots.is_empty());
    }

    #[test]
    fn test_parse_states_malformed() {
        let err = parse_states("<html>rate limited</html>", &fleet()).unwrap_err();
        assert!(matches!(err, Error::SourceDecode { .. }));
    }

    #[test]
    fn test_altitude_falls_back_to_barometric() {
        let body = r#"{"states": [["e0659a", "LVFVZ", "Argentina", 0, 0,
            -58.0, -34.0, 900.0, false, 50.0, 90.0, 0.0, null, null, null, false, 0]]}"#;
        let snapshots = parse_states(body, &fleet()).unwrap();
        assert_eq!(snapshots["e0659a"].altitude_m, Some(900.0));
        assert_eq!(snapshots["e0659a"].squawk, None);
    }

    #[test]
    fn test_new_trims_base_url() {
        let config = OpenSkyConfig {
            base_url: "https://example.test/api/".to_string(),
            ..OpenSkyConfig::default()
        };
        let source = OpenSky::new(&config).unwrap();
        assert_eq!(source.base_url, "https://example.test/api");
        assert_eq!(source.name(), "opensky");
        assert_eq!(source.timeout(), Duration::from_secs(config.timeout_secs));
    }
}
