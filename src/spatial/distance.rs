//! Great-circle distance on a spherical Earth.

use geo_types::Point;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two points given in decimal degrees.
pub fn haversine_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let lat1 = a.y().to_radians();
    let lat2 = b.y().to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.x() - a.x()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // Rounding can push h a hair over 1 for antipodal points
    2.0 * h.sqrt().min(1.0).asin() * EARTH_RADIUS_KM
}

/// Minutes on foot at the 12 min/km pace the tools quote.
pub fn walk_minutes(distance_km: f64) -> f64 {
    distance_km * 12.0
}

/// Rounds to two decimal places for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
