pub use shared::{
    ApiError, Fix, FixOutcome, GeoPoint, Phase, ProjectedPoint, Readout, RouteRequest,
    RouteResponse, RouteSource, SegmentStats, SimulateRequest, SimulateResponse,
    SimulationFrame, TrackRequest, TrackResponse, TrackUpdate,
};

/// Ordered polyline produced once per run. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<GeoPoint>,
}

impl Route {
    pub fn new(points: Vec<GeoPoint>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self { points })
        }
    }

    pub fn single(point: GeoPoint) -> Self {
        Self {
            points: vec![point],
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> GeoPoint {
        self.points[0]
    }

    pub fn last(&self) -> GeoPoint {
        self.points[self.points.len() - 1]
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }
}

/// A route together with the distance the producer reports for it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRoute {
    pub route: Route,
    pub distance_m: f64,
    pub source: RouteSource,
}
