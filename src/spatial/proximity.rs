use geo_types::Point;

use crate::spatial::{distance::haversine_km, Located};

/// Below this many candidates a bounding-box pass costs more than it saves.
const PREFILTER_MIN_STOPS: usize = 100;

/// Kilometres per degree used to size the prefilter box. Slightly below the true
/// value on a 6371 km sphere, so the box errs on the large side.
const KM_PER_DEGREE: f64 = 111.0;

#[derive(Debug)]
pub struct NearbyResult<'a, S> {
    pub stop: &'a S,
    pub distance_km: f64,
}

impl<S> Clone for NearbyResult<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for NearbyResult<'_, S> {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl BoundingBox {
    /// Degree box around `center` containing every point within `radius_km`.
    ///
    /// Returns `None` when the box would touch a pole or wrap the antimeridian;
    /// callers then fall back to scanning every stop.
    pub fn around(center: Point<f64>, radius_km: f64) -> Option<Self> {
        let lat_margin = radius_km / KM_PER_DEGREE;
        let edge_lat = center.y().abs() + lat_margin;
        if edge_lat >= 90.0 {
            return None;
        }

        // Widest longitude span of the circle is on its poleward side
        let lon_margin = radius_km / (KM_PER_DEGREE * edge_lat.to_radians().cos());
        let min_lon = center.x() - lon_margin;
        let max_lon = center.x() + lon_margin;
        if min_lon < -180.0 || max_lon > 180.0 {
            return None;
        }

        Some(Self {
            min_lat: center.y() - lat_margin,
            max_lat: center.y() + lat_margin,
            min_lon,
            max_lon,
        })
    }

    pub fn contains(&self, p: Point<f64>) -> bool {
        p.y() >= self.min_lat
            && p.y() <= self.max_lat
            && p.x() >= self.min_lon
            && p.x() <= self.max_lon
    }
}

/// Every stop within `radius_km` of `query`, nearest first. Ties keep input order.
pub fn find_nearby<S: Located>(
    stops: &[S],
    query: Point<f64>,
    radius_km: f64,
) -> Vec<NearbyResult<'_, S>> {
    if !radius_km.is_finite() || radius_km < 0.0 {
        return vec![];
    }

    let bbox = if stops.len() >= PREFILTER_MIN_STOPS {
        BoundingBox::around(query, radius_km)
    } else {
        None
    };

    let mut nearby: Vec<NearbyResult<'_, S>> = stops
        .iter()
        .filter(|s| bbox.map_or(true, |b| b.contains(s.location())))
        .filter_map(|stop| {
            let distance_km = haversine_km(query, stop.location());
            (distance_km <= radius_km).then_some(NearbyResult { stop, distance_km })
        })
        .collect();

    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}
