use rand::Rng;

use crate::config::GeneratorConfig;
use crate::distance::haversine_m;
use crate::models::{GeneratedRoute, GeoPoint, Route, RouteSource};
use crate::osrm::RoadRouter;

/// Flat-earth degree length used to turn a metric step into lat/lon deltas.
const METERS_PER_DEGREE: f64 = 111_000.0;
const ROAD_HEADINGS_DEG: [f64; 8] = [0.0, 45.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0];
const ROAD_TURNS_DEG: [f64; 4] = [-90.0, -45.0, 45.0, 90.0];

/// Produce the route for one run.
///
/// With a destination the road network is asked first; any failure or empty
/// answer falls back to [`steered_route`]. Without one, [`procedural_route`]
/// wanders for `target_m` meters.
pub async fn generate_route<R: Rng>(
    router: &dyn RoadRouter,
    rng: &mut R,
    start: GeoPoint,
    target_m: f64,
    destination: Option<GeoPoint>,
    config: &GeneratorConfig,
) -> GeneratedRoute {
    let Some(destination) = destination else {
        return procedural_route(start, target_m, config, rng);
    };

    match router.route(start, destination).await {
        Ok(road) => {
            let distance_m = road.distance_m;
            if let Some(route) = Route::new(road.points) {
                tracing::info!(
                    "road network route: {} points, {:.0} m",
                    route.len(),
                    distance_m
                );
                return GeneratedRoute {
                    route,
                    distance_m,
                    source: RouteSource::RoadNetwork,
                };
            }
            tracing::warn!("road network returned an empty route, falling back to simulated route");
        }
        Err(err) => tracing::warn!("falling back to simulated route: {err}"),
    }

    steered_route(start, destination, target_m, config, rng)
}

/// Random walk on road-like headings, one point per step.
pub fn procedural_route<R: Rng>(
    start: GeoPoint,
    target_m: f64,
    config: &GeneratorConfig,
    rng: &mut R,
) -> GeneratedRoute {
    let steps = step_count(target_m, config.step_m);
    let mut points = Vec::with_capacity(steps + 1);
    points.push(start);

    let mut heading = ROAD_HEADINGS_DEG[rng.gen_range(0..ROAD_HEADINGS_DEG.len())];
    let mut current = start;

    for _ in 0..steps {
        if rng.gen::<f64>() < config.turn_probability {
            let turn = ROAD_TURNS_DEG[rng.gen_range(0..ROAD_TURNS_DEG.len())];
            heading = (heading + turn).rem_euclid(360.0);
        }
        current = advance(current, heading, config.step_m);
        points.push(current);
    }

    tracing::debug!("procedural route: {} points for {:.0} m", points.len(), target_m);

    GeneratedRoute {
        route: route_from(points, start),
        distance_m: target_m,
        source: RouteSource::Procedural,
    }
}

/// Wander toward `destination`, covering at most `max_m` meters.
///
/// The heading is damped toward the bearing to the destination at every
/// step, with an occasional random deviation. When the whole straight-line
/// distance fits in `max_m`, the destination itself closes the route.
pub fn steered_route<R: Rng>(
    start: GeoPoint,
    destination: GeoPoint,
    max_m: f64,
    config: &GeneratorConfig,
    rng: &mut R,
) -> GeneratedRoute {
    let straight_m = haversine_m(start, destination);
    let use_m = if max_m.is_finite() {
        max_m.min(straight_m).max(0.0)
    } else {
        straight_m
    };
    let steps = step_count(use_m, config.step_m);

    let mut points = Vec::with_capacity(steps + 2);
    points.push(start);

    let mut current = start;
    let mut heading = bearing_deg(start, destination);

    for _ in 0..steps {
        let error = wrap_deg(bearing_deg(current, destination) - heading);
        heading += error * config.steer_damping;

        if rng.gen::<f64>() < config.jitter_probability {
            heading += (rng.gen::<f64>() - 0.5) * config.jitter_span_deg;
        }

        current = advance(current, heading, config.step_m);
        points.push(current);
    }

    if use_m >= straight_m {
        points.push(destination);
    }

    tracing::debug!(
        "steered route: {} points, {:.0} m of {:.0} m straight line",
        points.len(),
        use_m,
        straight_m
    );

    GeneratedRoute {
        route: route_from(points, start),
        distance_m: use_m,
        source: RouteSource::Steered,
    }
}

/// Requested target when the user pins a destination.
pub fn target_for_destination(origin: GeoPoint, destination: GeoPoint) -> f64 {
    haversine_m(origin, destination).round()
}

/// Initial great-circle bearing in degrees, clockwise from north.
pub fn bearing_deg(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x).to_degrees()
}

fn step_count(distance_m: f64, step_m: f64) -> usize {
    if !distance_m.is_finite() || distance_m <= 0.0 || step_m <= 0.0 {
        return 0;
    }
    (distance_m / step_m).ceil() as usize
}

/// Wrap an angle difference into [-180, 180).
fn wrap_deg(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

fn advance(from: GeoPoint, heading_deg: f64, step_m: f64) -> GeoPoint {
    let (sin_h, cos_h) = heading_deg.to_radians().sin_cos();
    let dlat = cos_h * step_m / METERS_PER_DEGREE;
    let dlon = sin_h * step_m / (METERS_PER_DEGREE * from.lat.to_radians().cos());
    let lat = (from.lat + dlat).clamp(-90.0, 90.0);
    let lon = (from.lon + dlon + 180.0).rem_euclid(360.0) - 180.0;
    GeoPoint::new(lat, lon)
}

fn route_from(points: Vec<GeoPoint>, start: GeoPoint) -> Route {
    Route::new(points).unwrap_or_else(|| Route::single(start))
}
