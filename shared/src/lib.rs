use serde::{Deserialize, Serialize};

/// Geographic position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Planar UTM coordinate. Only comparable with points of the same `zone`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub easting: f64,
    pub northing: f64,
    pub zone: u8,
}

/// One sample pushed by a geolocation provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub timestamp_ms: i64,
}

impl Fix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    RoadNetwork,
    Steered,
    Procedural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Starting,
    Running,
    Stopped,
}

/// Scalar values shown next to the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readout {
    pub speed_mps: f64,
    pub traveled_m: f64,
    pub target_m: f64,
    pub progress_percent: f64,
    pub elapsed_s: f64,
    pub remaining: String,
    pub zoom: u8,
}

/// Everything a rendering surface needs after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationFrame {
    pub position: GeoPoint,
    /// Route points passed over during this tick, in order.
    pub passed: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<GeoPoint>,
    pub readout: Readout,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: GeoPoint,
    #[serde(default = "default_target_m")]
    pub target_m: f64,
    #[serde(default)]
    pub destination: Option<GeoPoint>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub path: Vec<GeoPoint>,
    pub distance_m: f64,
    pub cumulative_m: Vec<f64>,
    pub source: RouteSource,
    pub gpx_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateRequest {
    #[serde(flatten)]
    pub route: RouteRequest,
    #[serde(default = "default_speed_mps")]
    pub speed_mps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateResponse {
    pub source: RouteSource,
    pub frames: Vec<SimulationFrame>,
    pub path: Vec<GeoPoint>,
    pub readout: Readout,
    pub gpx_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRequest {
    pub fixes: Vec<Fix>,
}

/// Outcome of feeding one fix into a live track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackUpdate {
    pub position: GeoPoint,
    pub total_distance_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<SegmentStats>,
    pub moving: bool,
    pub outcome: FixOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub distance_m: f64,
    pub dt_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_speed: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOutcome {
    First,
    Accumulated,
    BelowNoiseFloor,
    Jump,
    ZoneMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResponse {
    pub total_distance_m: f64,
    pub updates: Vec<TrackUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

pub fn default_target_m() -> f64 {
    100.0
}

pub fn default_speed_mps() -> f64 {
    2.0
}
