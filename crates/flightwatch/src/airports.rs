//! Static airport reference set.
//!
//! Covers the airports the fleet normally operates between: Argentina plus
//! the nearest regional hubs.

/// A reference airport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Airport {
    /// ICAO location indicator.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Airport {
    const fn new(code: &'static str, name: &'static str, latitude: f64, longitude: f64) -> Self {
        Self {
            code,
            name,
            latitude,
            longitude,
        }
    }
}

/// All known airports, in lookup order.
pub static AIRPORTS: &[Airport] = &[
    Airport::new("SAEZ", "Ezeiza", -34.8222, -58.5358),
    Airport::new("SABE", "Aeroparque Jorge Newbery", -34.5592, -58.4156),
    Airport::new("SADF", "San Fernando", -34.4532, -58.5896),
    Airport::new("SADP", "El Palomar", -34.6099, -58.6126),
    Airport::new("SAAR", "Rosario", -32.9036, -60.7850),
    Airport::new("SAAP", "Paraná", -31.7948, -60.4804),
    Airport::new("SACO", "Córdoba", -31.3236, -64.2080),
    Airport::new("SAME", "Mendoza", -32.8317, -68.7929),
    Airport::new("SANT", "Tucumán", -26.8409, -65.1049),
    Airport::new("SASA", "Salta", -24.8560, -65.4862),
    Airport::new("SARI", "Iguazú", -25.7373, -54.4734),
    Airport::new("SAZM", "Mar del Plata", -37.9342, -57.5733),
    Airport::new("SAZB", "Bahía Blanca", -38.7250, -62.1693),
    Airport::new("SAZN", "Neuquén", -38.9490, -68.1557),
    Airport::new("SAZS", "Bariloche", -41.1512, -71.1578),
    Airport::new("SAVC", "Comodoro Rivadavia", -45.7853, -67.4655),
    Airport::new("SAWH", "Ushuaia", -54.8433, -68.2958),
    Airport::new("SUMU", "Montevideo Carrasco", -34.8384, -56.0308),
    Airport::new("SULS", "Punta del Este", -34.8551, -55.0943),
    Airport::new("SGAS", "Asunción", -25.2400, -57.5192),
    Airport::new("SCEL", "Santiago", -33.3930, -70.7858),
    Airport::new("SBGR", "São Paulo Guarulhos", -23.4356, -46.4731),
];

/// Find an airport by its ICAO code.
#[must_use]
pub fn by_code(code: &str) -> Option<&'static Airport> {
    AIRPORTS.iter().find(|a| a.code.eq_ignore_ascii_case(code))
}
