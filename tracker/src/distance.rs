use serde::{Deserialize, Serialize};

use crate::models::{GeoPoint, ProjectedPoint};
use crate::projection::project;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters on a sphere of radius [`EARTH_RADIUS_M`].
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).max(0.0).sqrt())
}

/// Euclidean distance between two projected points, or `None` when they lie
/// in different zones and are not comparable.
pub fn planar_m(a: ProjectedPoint, b: ProjectedPoint) -> Option<f64> {
    if a.zone != b.zone {
        return None;
    }
    Some((b.easting - a.easting).hypot(b.northing - a.northing))
}

/// Sum of great-circle segment lengths along a path.
pub fn path_length_m(path: &[GeoPoint]) -> f64 {
    path.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceStrategy {
    #[default]
    Planar,
    GreatCircle,
}

impl DistanceStrategy {
    /// `None` means the pair is not comparable under this strategy.
    pub fn measure(self, a: GeoPoint, b: GeoPoint) -> Option<f64> {
        match self {
            DistanceStrategy::Planar => planar_m(project(a), project(b)),
            DistanceStrategy::GreatCircle => Some(haversine_m(a, b)),
        }
    }
}
