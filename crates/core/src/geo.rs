//! Great-circle distance and distance scoring.
//!
//! Pure functions used by the match scorer to rate how close a worker is
//! to a job site. Coordinates that fail validation never produce an error;
//! they simply score zero, so a worker with a stale or corrupt location
//! report falls to the bottom of the ranking instead of breaking it.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers (haversine).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default cutoff beyond which the distance score is zero.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;

/// A WGS-84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// A coordinate is valid when both components are finite and within
    /// the WGS-84 range.
    pub fn is_valid(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && self.longitude.abs() <= 180.0
            && self.latitude.abs() <= 90.0
    }
}

/// Great-circle distance between two points in kilometers.
///
/// Returns `None` when either coordinate is malformed.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> Option<f64> {
    if !a.is_valid() || !b.is_valid() {
        return None;
    }

    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    Some(EARTH_RADIUS_KM * c)
}

/// Map a distance to a 0-100 score, linearly decreasing up to `max_km`.
///
/// `round(100 * (1 - d / max_km))`, clamped to 0 beyond the cutoff.
/// A non-positive `max_km` scores 0 for any distance.
pub fn distance_score(distance_km: f64, max_km: f64) -> i32 {
    if !distance_km.is_finite() || distance_km < 0.0 || max_km <= 0.0 {
        return 0;
    }
    if distance_km > max_km {
        return 0;
    }
    (100.0 * (1.0 - distance_km / max_km)).round() as i32
}
