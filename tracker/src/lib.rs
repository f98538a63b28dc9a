pub mod clock;
pub mod config;
pub mod cumulative;
pub mod distance;
pub mod error;
pub mod gpx_export;
pub mod models;
pub mod osrm;
pub mod projection;
pub mod readout;
pub mod routing;
pub mod runner;
pub mod simulator;
pub mod tracking;

use std::{fmt::Display, sync::Arc};

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use crate::config::EngineConfig;
use crate::cumulative::CumulativeDistances;
use crate::distance::haversine_m;
use crate::gpx_export::encode_path_as_gpx;
use crate::models::{
    ApiError, GeoPoint, RouteRequest, RouteResponse, SimulateRequest, SimulateResponse,
    TrackRequest, TrackResponse,
};
use crate::osrm::RoadRouter;
use crate::routing::generate_route;
use crate::simulator::Simulator;
use crate::tracking::TrackingSession;

/// Longest trip a single request may ask for.
const MAX_TARGET_M: f64 = 50_000.0;
/// Upper bound on ticks computed for one `/api/simulate` call.
const MAX_SIMULATED_FRAMES: f64 = 200_000.0;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub router: Arc<dyn RoadRouter>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/route", post(route_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/track", post(track_handler))
        .with_state(state)
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

async fn route_handler(State(state): State<AppState>, Json(req): Json<RouteRequest>) -> ApiResult<RouteResponse> {
    check_trip(&req)?;
    let mut rng = XorShiftRng::seed_from_u64(req.seed.unwrap_or_else(rand::random));
    let generated = generate_route(
        state.router.as_ref(),
        &mut rng,
        req.start,
        req.target_m,
        req.destination,
        &state.config.generator,
    )
    .await;

    let cumulative = CumulativeDistances::build(&generated.route);
    let gpx_base64 = encode_path_as_gpx(generated.route.points(), "route").map_err(internal_error)?;

    Ok(Json(RouteResponse {
        distance_m: generated.distance_m,
        cumulative_m: cumulative.as_slice().to_vec(),
        source: generated.source,
        path: generated.route.into_points(),
        gpx_base64,
    }))
}

async fn simulate_handler(
    State(state): State<AppState>,
    Json(req): Json<SimulateRequest>,
) -> ApiResult<SimulateResponse> {
    check_trip(&req.route)?;
    let mut sim = Simulator::new(req.route.start, req.speed_mps, req.route.target_m).map_err(bad_request)?;
    sim.set_destination(req.route.destination).map_err(bad_request)?;

    let Some(ticket) = sim.begin_start() else {
        return Err(internal_error("fresh simulator refused to start"));
    };
    let mut rng = XorShiftRng::seed_from_u64(req.route.seed.unwrap_or_else(rand::random));
    let generated = generate_route(
        state.router.as_ref(),
        &mut rng,
        ticket.origin,
        ticket.target_m,
        ticket.destination,
        &state.config.generator,
    )
    .await;
    let source = generated.source;
    sim.commit_start(&ticket, generated)
        .map_err(|err| error_response(StatusCode::UNPROCESSABLE_ENTITY, err))?;

    let dt = state.config.tick_period().as_secs_f64();
    let run = sim.state();
    if run.target_m / (run.speed_mps * dt) > MAX_SIMULATED_FRAMES {
        return Err(bad_request(format!(
            "{:.0} m at {} m/s needs more than {MAX_SIMULATED_FRAMES} ticks",
            run.target_m, run.speed_mps
        )));
    }

    let frames = sim.run_to_completion(dt);
    let gpx_base64 = encode_path_as_gpx(sim.path(), "simulated run").map_err(internal_error)?;
    tracing::debug!("simulated {} frames from {:?} route", frames.len(), source);

    Ok(Json(SimulateResponse {
        source,
        frames,
        path: sim.path().to_vec(),
        readout: sim.readout(),
        gpx_base64,
    }))
}

async fn track_handler(State(state): State<AppState>, Json(req): Json<TrackRequest>) -> ApiResult<TrackResponse> {
    let mut session = TrackingSession::new(state.config.tracking);
    session.start();

    let updates = req
        .fixes
        .into_iter()
        .map(|fix| session.handle(Ok(fix)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(bad_request)?;

    Ok(Json(TrackResponse {
        total_distance_m: session.track().total_distance_m(),
        updates,
    }))
}

fn check_trip(req: &RouteRequest) -> Result<(), (StatusCode, Json<ApiError>)> {
    check_point(req.start)?;
    if let Some(destination) = req.destination {
        check_point(destination)?;
        let span_m = haversine_m(req.start, destination);
        if span_m > MAX_TARGET_M {
            return Err(bad_request(format!(
                "destination lies {span_m:.0} m from start, limit is {MAX_TARGET_M} m"
            )));
        }
    }
    if !req.target_m.is_finite() || !(0.0..=MAX_TARGET_M).contains(&req.target_m) {
        return Err(bad_request(format!(
            "target_m must lie in [0, {MAX_TARGET_M}], got {}",
            req.target_m
        )));
    }
    Ok(())
}

fn check_point(point: GeoPoint) -> Result<(), (StatusCode, Json<ApiError>)> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(bad_request(format!("invalid coordinate ({}, {})", point.lat, point.lon)))
    }
}

fn bad_request(err: impl Display) -> (StatusCode, Json<ApiError>) {
    error_response(StatusCode::BAD_REQUEST, err)
}

fn internal_error(err: impl Display) -> (StatusCode, Json<ApiError>) {
    tracing::error!("request failed: {err}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
}

fn error_response(status: StatusCode, err: impl Display) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
