//! Geospatial estimation of flight context.
//!
//! Pure functions over positions and the static airport set: great-circle
//! distance and bearing, nearest airport, destination inference, ETA, and
//! the small classifications used in alerts (compass point, vertical trend,
//! emergency squawk).

use serde::{Deserialize, Serialize};

use crate::airports::Airport;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Airports closer than this are "nearest", never "destination".
pub const DESTINATION_MIN_DISTANCE_KM: f64 = 5.0;

/// Maximum deviation between heading and bearing for a destination candidate.
pub const DESTINATION_MAX_DEVIATION_DEG: f64 = 45.0;

/// Vertical rates within this band (ft/min) count as level flight.
///
/// Matches the smallest non-zero step of the reported vertical rate.
pub const LEVEL_BAND_FPM: f64 = 64.0;

/// A point on the Earth in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Position {
    /// Create a position.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<&Airport> for Position {
    fn from(airport: &Airport) -> Self {
        Self::new(airport.latitude, airport.longitude)
    }
}

/// An airport together with its distance from the aircraft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirportFix {
    /// The airport.
    pub airport: &'static Airport,
    /// Distance in kilometres, rounded to one decimal.
    pub distance_km: f64,
}

/// Great-circle distance in kilometres (haversine).
#[must_use]
pub fn distance_km(from: Position, to: Position) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Initial great-circle bearing from `from` to `to`, in degrees `[0, 360)`.
#[must_use]
pub fn bearing_deg(from: Position, to: Position) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let x = delta_lon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    x.atan2(y).to_degrees().rem_euclid(360.0)
}

/// Signed difference `a - b` wrapped to `[-180, 180)`.
#[must_use]
pub fn angular_difference(a: f64, b: f64) -> f64 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// The airport closest to `position`.
///
/// Returns `None` only when `airports` is empty. Ties keep the first airport.
#[must_use]
pub fn nearest_airport(position: Position, airports: &'static [Airport]) -> Option<AirportFix> {
    let mut best: Option<(&'static Airport, f64)> = None;
    for airport in airports {
        let distance = distance_km(position, airport.into());
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((airport, distance));
        }
    }
    best.map(|(airport, distance)| AirportFix {
        airport,
        distance_km: round_one_decimal(distance),
    })
}

/// Infer the destination from the current heading.
///
/// Candidates lie within 45° of `heading` and farther than 5 km; the one with
/// the smallest deviation wins, ties keep the first encountered.
#[must_use]
pub fn destination_airport(
    position: Position,
    heading: f64,
    airports: &'static [Airport],
) -> Option<AirportFix> {
    let mut best: Option<(&'static Airport, f64, f64)> = None;
    for airport in airports {
        let target = Position::from(airport);
        let distance = distance_km(position, target);
        if distance <= DESTINATION_MIN_DISTANCE_KM {
            continue;
        }
        let deviation = angular_difference(bearing_deg(position, target), heading).abs();
        if deviation >= DESTINATION_MAX_DEVIATION_DEG {
            continue;
        }
        if best.map_or(true, |(_, _, d)| deviation < d) {
            best = Some((airport, distance, deviation));
        }
    }
    best.map(|(airport, distance, _)| AirportFix {
        airport,
        distance_km: round_one_decimal(distance),
    })
}

/// Estimated time to cover `distance_km` at `speed_kmh`, in whole minutes.
///
/// `None` when the speed is unknown or not positive.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn eta_minutes(distance_km: f64, speed_kmh: Option<f64>) -> Option<i64> {
    let speed = speed_kmh.filter(|s| *s > 0.0)?;
    Some((distance_km / speed * 60.0).round() as i64)
}

/// The eight compass points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinal {
    /// North.
    N,
    /// North-east.
    NE,
    /// East.
    E,
    /// South-east.
    SE,
    /// South.
    S,
    /// South-west.
    SW,
    /// West.
    W,
    /// North-west.
    NW,
}

impl Cardinal {
    const ALL: [Self; 8] = [
        Self::N,
        Self::NE,
        Self::E,
        Self::SE,
        Self::S,
        Self::SW,
        Self::W,
        Self::NW,
    ];

    /// Map a heading in degrees to its compass point: `round(heading / 45) mod 8`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_heading(heading: f64) -> Self {
        let sector = (heading.rem_euclid(360.0) / 45.0).round() as usize % 8;
        Self::ALL[sector]
    }
}

impl std::fmt::Display for Cardinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::N => "N",
            Self::NE => "NE",
            Self::E => "E",
            Self::SE => "SE",
            Self::S => "S",
            Self::SW => "SW",
            Self::W => "W",
            Self::NW => "NW",
        };
        f.write_str(s)
    }
}

/// Whether the aircraft is climbing, descending or level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalTrend {
    /// Vertical rate above the level band.
    Climbing,
    /// Vertical rate below the level band.
    Descending,
    /// Vertical rate within the level band.
    Level,
    /// No vertical rate reported.
    Unknown,
}

impl VerticalTrend {
    /// Classify a vertical rate in feet per minute.
    #[must_use]
    pub fn from_rate(vertical_rate_fpm: Option<f64>) -> Self {
        match vertical_rate_fpm {
            None => Self::Unknown,
            Some(rate) if rate > LEVEL_BAND_FPM => Self::Climbing,
            Some(rate) if rate < -LEVEL_BAND_FPM => Self::Descending,
            Some(_) => Self::Level,
        }
    }
}

impl std::fmt::Display for VerticalTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Climbing => write!(f, "climbing"),
            Self::Descending => write!(f, "descending"),
            Self::Level => write!(f, "level"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Emergency meaning of a squawk code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emergency {
    /// 7700.
    General,
    /// 7600.
    RadioFailure,
    /// 7500.
    UnlawfulInterference,
    /// Any other code.
    None,
}

impl Emergency {
    /// Classify a squawk code.
    #[must_use]
    pub fn from_squawk(squawk: Option<&str>) -> Self {
        match squawk.map(str::trim) {
            Some("7700") => Self::General,
            Some("7600") => Self::RadioFailure,
            Some("7500") => Self::UnlawfulInterference,
            _ => Self::None,
        }
    }

    /// Check if this is an actual emergency.
    #[must_use]
    pub fn is_emergency(self) -> bool {
        self != Self::None
    }
}

impl std::fmt::Display for Emergency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => write!(f, "general emergency (7700)"),
            Self::RadioFailure => write!(f, "radio failure (7600)"),
            Self::UnlawfulInterference => write!(f, "unlawful interference (7500)"),
            Self::None => write!(f, "none"),
        }
    }
}
