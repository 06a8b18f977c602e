use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Sentinel port name for shipments whose origin could not be geocoded
pub const UNKNOWN_PORT: &str = "Unknown";

/// A reference container port
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Port {
    pub port_name: String,
    pub lat: f64,
    pub lon: f64,
}

/// The static reference table of major North-American container ports
pub static PORT_REFERENCE: Lazy<Vec<Port>> = Lazy::new(|| {
    [
        ("Port of Los Angeles", 33.7405, -118.2775),
        ("Port of Long Beach", 33.7701, -118.1937),
        ("Port of New York/New Jersey", 40.6681, -74.0451),
        ("Port of Savannah", 32.0809, -81.0912),
        ("Port of Houston", 29.7604, -95.3698),
        ("Port of Seattle", 47.6062, -122.3321),
    ]
    .into_iter()
    .map(|(name, lat, lon)| Port {
        port_name: name.to_string(),
        lat,
        lon,
    })
    .collect()
});

/// Great-circle distance between two coordinates in kilometres
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Nearest port to a coordinate, with its distance in kilometres
pub fn nearest_port(lat: f64, lon: f64, ports: &[Port]) -> Option<(&Port, f64)> {
    ports
        .iter()
        .map(|p| (p, haversine_km(lat, lon, p.lat, p.lon)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}
