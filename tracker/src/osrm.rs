use std::{future::Future, pin::Pin, time::Duration};

use serde::Deserialize;

use crate::models::GeoPoint;

/// Road-following route returned by a routing service.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadRoute {
    pub points: Vec<GeoPoint>,
    pub distance_m: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("routing service answered with status {0}")]
    Status(u16),
    #[error("routing service returned no routes")]
    NoRoute,
    #[error("road routing is disabled")]
    Disabled,
}

pub type RouteFuture<'a> = Pin<Box<dyn Future<Output = Result<RoadRoute, RoutingError>> + Send + 'a>>;

/// External road network able to connect two points.
///
/// Any error is a fallback trigger for the caller, never fatal.
pub trait RoadRouter: Send + Sync {
    fn route<'a>(&'a self, origin: GeoPoint, destination: GeoPoint) -> RouteFuture<'a>;
}

/// Client for the OSRM `route/v1/driving` endpoint.
#[derive(Clone)]
pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RoutingError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn route_url(&self, origin: GeoPoint, destination: GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, origin.lon, origin.lat, destination.lon, destination.lat
        )
    }

    async fn fetch(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RoadRoute, RoutingError> {
        let url = self.route_url(origin, destination);
        tracing::debug!("requesting road route: {url}");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Status(status.as_u16()));
        }
        let body: OsrmResponse = response.json().await?;
        body.into_road_route()
    }
}

impl RoadRouter for OsrmClient {
    fn route<'a>(&'a self, origin: GeoPoint, destination: GeoPoint) -> RouteFuture<'a> {
        Box::pin(self.fetch(origin, destination))
    }
}

/// Router that always fails, forcing the synthetic fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRouter;

impl RoadRouter for OfflineRouter {
    fn route<'a>(&'a self, _origin: GeoPoint, _destination: GeoPoint) -> RouteFuture<'a> {
        Box::pin(async { Err(RoutingError::Disabled) })
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: `[lon, lat]`.
    coordinates: Vec<[f64; 2]>,
}

impl OsrmResponse {
    fn into_road_route(self) -> Result<RoadRoute, RoutingError> {
        let route = self.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
        let points: Vec<GeoPoint> = route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lon, lat]| GeoPoint::new(lat, lon))
            .collect();
        if points.is_empty() {
            return Err(RoutingError::NoRoute);
        }
        Ok(RoadRoute {
            points,
            distance_m: route.distance,
        })
    }
}
