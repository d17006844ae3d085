pub mod distance;
pub mod proximity;

use geo_types::Point;

/// Anything with a fixed position, in decimal degrees (`x` = longitude, `y` = latitude).
pub trait Located {
    fn location(&self) -> Point<f64>;
}

/// Builds a point from latitude and longitude in that order, which is how every
/// upstream source and tool argument supplies them.
pub fn lat_lon(lat: f64, lon: f64) -> Point<f64> {
    Point::new(lon, lat)
}
