//! Discrete-time traversal of a generated route.
//!
//! [`Simulator`] is a plain state machine: it never sleeps and never performs
//! I/O. Callers drive it with [`Simulator::tick`] and hand it the route
//! produced for a [`RunTicket`]. A ticket goes stale as soon as the run is
//! stopped or reset, so a route that arrives late is discarded.

use crate::cumulative::CumulativeDistances;
use crate::distance::haversine_m;
use crate::models::{GeneratedRoute, GeoPoint, Phase, Readout, Route, SimulationFrame};
use crate::readout::{format_remaining, progress_percent, zoom_for_distance};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StartError {
    #[error("route contains insufficient points ({0}), at least 2 are required")]
    InsufficientRoute(usize),
    #[error("run was stopped or reset before its route arrived")]
    Cancelled,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SimulationError {
    #[error("speed must be a positive number, got {0}")]
    InvalidSpeed(f64),
    #[error("target distance must be a non-negative number, got {0}")]
    InvalidTarget(f64),
    #[error("invalid coordinate ({}, {})", .0.lat, .0.lon)]
    InvalidPoint(GeoPoint),
    #[error("cannot change the trip while a run is active")]
    RunActive,
}

/// Handed out by [`Simulator::begin_start`]; carries what the route
/// generator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTicket {
    generation: u64,
    pub origin: GeoPoint,
    pub target_m: f64,
    pub destination: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationState {
    pub route_index: usize,
    pub traveled_m: f64,
    pub elapsed_s: f64,
    pub target_m: f64,
    pub speed_mps: f64,
}

/// Everything an observer needs to redraw the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub position: GeoPoint,
    pub path: Vec<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub readout: Readout,
}

#[derive(Debug, Clone)]
struct ActiveRun {
    route: Route,
    cumulative: CumulativeDistances,
}

#[derive(Debug, Clone)]
pub struct Simulator {
    phase: Phase,
    generation: u64,
    state: SimulationState,
    requested_target_m: f64,
    position: GeoPoint,
    path: Vec<GeoPoint>,
    destination: Option<GeoPoint>,
    run: Option<ActiveRun>,
}

impl Simulator {
    pub fn new(origin: GeoPoint, speed_mps: f64, target_m: f64) -> Result<Self, SimulationError> {
        check_point(origin)?;
        check_speed(speed_mps)?;
        check_target(target_m)?;
        Ok(Self {
            phase: Phase::Idle,
            generation: 0,
            state: SimulationState {
                route_index: 0,
                traveled_m: 0.0,
                elapsed_s: 0.0,
                target_m,
                speed_mps,
            },
            requested_target_m: target_m,
            position: origin,
            path: vec![origin],
            destination: None,
            run: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Starting or Running.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Starting | Phase::Running)
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn position(&self) -> GeoPoint {
        self.position
    }

    pub fn path(&self) -> &[GeoPoint] {
        &self.path
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.destination
    }

    pub fn route(&self) -> Option<&Route> {
        self.run.as_ref().map(|run| &run.route)
    }

    /// Takes effect on the next tick, including mid-run.
    pub fn set_speed(&mut self, speed_mps: f64) -> Result<(), SimulationError> {
        check_speed(speed_mps)?;
        self.state.speed_mps = speed_mps;
        Ok(())
    }

    pub fn set_target(&mut self, target_m: f64) -> Result<(), SimulationError> {
        check_target(target_m)?;
        if self.is_active() {
            return Err(SimulationError::RunActive);
        }
        self.requested_target_m = target_m;
        self.state.target_m = target_m;
        Ok(())
    }

    /// Pinning a destination replaces the target with the straight-line
    /// distance to it, rounded to the meter.
    pub fn set_destination(&mut self, destination: Option<GeoPoint>) -> Result<(), SimulationError> {
        if self.is_active() {
            return Err(SimulationError::RunActive);
        }
        if let Some(point) = destination {
            check_point(point)?;
            let target = haversine_m(self.position, point).round();
            self.requested_target_m = target;
            self.state.target_m = target;
        }
        self.destination = destination;
        Ok(())
    }

    /// Enter Starting and hand out a ticket for route generation.
    ///
    /// Returns `None` while a run is already Starting or Running.
    pub fn begin_start(&mut self) -> Option<RunTicket> {
        if self.is_active() {
            tracing::debug!("start ignored, run already active");
            return None;
        }

        self.generation += 1;
        self.phase = Phase::Starting;
        self.run = None;
        self.state.route_index = 0;
        self.state.traveled_m = 0.0;
        self.state.elapsed_s = 0.0;
        self.state.target_m = self.requested_target_m;
        self.path.clear();
        self.path.push(self.position);

        Some(RunTicket {
            generation: self.generation,
            origin: self.position,
            target_m: self.requested_target_m,
            destination: self.destination,
        })
    }

    /// Commit a generated route and enter Running.
    ///
    /// A stale ticket yields [`StartError::Cancelled`] and changes nothing. A
    /// route with fewer than two points returns the simulator to Idle.
    pub fn commit_start(
        &mut self,
        ticket: &RunTicket,
        generated: GeneratedRoute,
    ) -> Result<(), StartError> {
        if ticket.generation != self.generation || self.phase != Phase::Starting {
            tracing::debug!("discarding route for stale run {}", ticket.generation);
            return Err(StartError::Cancelled);
        }

        if generated.route.len() < 2 {
            self.phase = Phase::Idle;
            return Err(StartError::InsufficientRoute(generated.route.len()));
        }

        let cumulative = CumulativeDistances::build(&generated.route);
        let route_m = if generated.distance_m.is_finite() && generated.distance_m > 0.0 {
            generated.distance_m
        } else {
            cumulative.total()
        };
        let effective_m = match ticket.destination {
            Some(_) => route_m,
            None if route_m > 0.0 => ticket.target_m.min(route_m),
            None => ticket.target_m,
        };
        if ticket.destination.is_some() {
            self.requested_target_m = route_m.round();
        }

        tracing::info!(
            "run {} started: {} route points, {:.1} m target ({:?})",
            ticket.generation,
            generated.route.len(),
            effective_m,
            generated.source
        );

        self.state.target_m = effective_m;
        self.state.route_index = 0;
        self.run = Some(ActiveRun {
            route: generated.route,
            cumulative,
        });
        self.phase = Phase::Running;
        Ok(())
    }

    /// Advance the run by `dt_s` seconds.
    ///
    /// Returns `None` unless Running, and ignores any step that is not a
    /// finite positive number of seconds. Progress is measured in traveled
    /// distance; the position snaps to the last route point reached.
    pub fn tick(&mut self, dt_s: f64) -> Option<SimulationFrame> {
        if self.phase != Phase::Running {
            return None;
        }
        if !dt_s.is_finite() || dt_s <= 0.0 {
            tracing::debug!("ignoring tick of {dt_s} s");
            return None;
        }
        let run = self.run.as_ref()?;
        let points = run.route.points();
        let cumulative = run.cumulative.as_slice();
        let last_index = points.len() - 1;

        let state = &mut self.state;
        state.elapsed_s += dt_s;
        state.traveled_m = (state.traveled_m + state.speed_mps * dt_s).min(state.target_m);

        let mut passed = Vec::new();
        while state.route_index < last_index && cumulative[state.route_index + 1] <= state.traveled_m {
            state.route_index += 1;
            passed.push(points[state.route_index]);
        }

        if let Some(&reached) = passed.last() {
            self.position = reached;
            self.path.extend_from_slice(&passed);
        }

        let finished = state.traveled_m >= state.target_m || state.route_index >= last_index;
        if finished {
            self.phase = Phase::Stopped;
            tracing::info!(
                "run {} finished: {:.1} m in {:.1} s",
                self.generation,
                self.state.traveled_m,
                self.state.elapsed_s
            );
        }

        Some(SimulationFrame {
            position: self.position,
            passed,
            destination: self.destination,
            readout: self.readout(),
            finished,
        })
    }

    /// Tick until the run ends. An unusable step yields no frames.
    pub fn run_to_completion(&mut self, dt_s: f64) -> Vec<SimulationFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.tick(dt_s) {
            frames.push(frame);
        }
        frames
    }

    /// Halt the run, keeping position and path. Idempotent.
    pub fn stop(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.generation += 1;
        self.phase = Phase::Stopped;
        tracing::info!("run stopped at {:.1} m", self.state.traveled_m);
        true
    }

    /// Back to Idle at `origin`, discarding the route.
    pub fn reset(&mut self, origin: GeoPoint) {
        self.generation += 1;
        self.phase = Phase::Idle;
        self.run = None;
        self.position = origin;
        self.path.clear();
        self.path.push(origin);
        self.state.route_index = 0;
        self.state.traveled_m = 0.0;
        self.state.elapsed_s = 0.0;
        self.state.target_m = self.requested_target_m;
    }

    pub fn readout(&self) -> Readout {
        let state = &self.state;
        Readout {
            speed_mps: state.speed_mps,
            traveled_m: state.traveled_m,
            target_m: state.target_m,
            progress_percent: progress_percent(state.traveled_m, state.target_m),
            elapsed_s: state.elapsed_s,
            remaining: format_remaining(state.target_m - state.traveled_m, state.speed_mps),
            zoom: zoom_for_distance(state.target_m),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            position: self.position,
            path: self.path.clone(),
            destination: self.destination,
            readout: self.readout(),
        }
    }
}

fn check_speed(speed_mps: f64) -> Result<(), SimulationError> {
    if speed_mps.is_finite() && speed_mps > 0.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidSpeed(speed_mps))
    }
}

fn check_target(target_m: f64) -> Result<(), SimulationError> {
    if target_m.is_finite() && target_m >= 0.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidTarget(target_m))
    }
}

fn check_point(point: GeoPoint) -> Result<(), SimulationError> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(SimulationError::InvalidPoint(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::models::RouteSource;
    use crate::routing::procedural_route;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    const ORIGIN: GeoPoint = GeoPoint::new(14.5995, 120.9842);
    const DT: f64 = 0.1;

    /// Straight north, one point every 0.001° (~111 m).
    fn straight_route(points: usize) -> GeneratedRoute {
        let points: Vec<GeoPoint> = (0..points)
            .map(|i| GeoPoint::new(ORIGIN.lat + i as f64 * 0.001, ORIGIN.lon))
            .collect();
        let route = Route::new(points).expect("non-empty");
        let distance_m = CumulativeDistances::build(&route).total();
        GeneratedRoute {
            route,
            distance_m,
            source: RouteSource::Procedural,
        }
    }

    fn running(speed: f64, target: f64, route: GeneratedRoute) -> Simulator {
        let mut sim = Simulator::new(ORIGIN, speed, target).expect("valid");
        let ticket = sim.begin_start().expect("idle");
        sim.commit_start(&ticket, route).expect("route");
        sim
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert_eq!(
            Simulator::new(ORIGIN, 0.0, 100.0).err(),
            Some(SimulationError::InvalidSpeed(0.0))
        );
        assert!(Simulator::new(ORIGIN, 2.0, -1.0).is_err());
        assert!(Simulator::new(GeoPoint::new(91.0, 0.0), 2.0, 100.0).is_err());
    }

    #[test]
    fn test_begin_start_is_idempotent() {
        let mut sim = Simulator::new(ORIGIN, 2.0, 100.0).expect("valid");
        let first = sim.begin_start();
        assert!(first.is_some());
        assert_eq!(sim.phase(), Phase::Starting);
        assert!(sim.begin_start().is_none());

        let ticket = first.expect("ticket");
        sim.commit_start(&ticket, straight_route(3)).expect("route");
        assert_eq!(sim.phase(), Phase::Running);
        assert!(sim.begin_start().is_none());
        assert_eq!(sim.phase(), Phase::Running);
    }

    #[test]
    fn test_short_route_returns_to_idle() {
        let mut sim = Simulator::new(ORIGIN, 2.0, 100.0).expect("valid");
        let ticket = sim.begin_start().expect("idle");
        let result = sim.commit_start(&ticket, straight_route(1));
        assert_eq!(result, Err(StartError::InsufficientRoute(1)));
        assert_eq!(sim.phase(), Phase::Idle);
        assert!(sim.tick(DT).is_none());
    }

    #[test]
    fn test_stale_ticket_is_discarded_after_stop() {
        let mut sim = Simulator::new(ORIGIN, 2.0, 100.0).expect("valid");
        let ticket = sim.begin_start().expect("idle");
        assert!(sim.stop());
        assert_eq!(sim.commit_start(&ticket, straight_route(3)), Err(StartError::Cancelled));
        assert_eq!(sim.phase(), Phase::Stopped);
        assert!(sim.route().is_none());
    }

    #[test]
    fn test_stale_ticket_is_discarded_after_reset_and_restart() {
        let mut sim = Simulator::new(ORIGIN, 2.0, 100.0).expect("valid");
        let old = sim.begin_start().expect("idle");
        sim.reset(ORIGIN);
        let new = sim.begin_start().expect("idle again");
        assert_eq!(sim.commit_start(&old, straight_route(3)), Err(StartError::Cancelled));
        assert_eq!(sim.phase(), Phase::Starting);
        sim.commit_start(&new, straight_route(3)).expect("fresh ticket");
        assert_eq!(sim.phase(), Phase::Running);
    }

    #[test]
    fn test_tick_advances_distance_and_time() {
        let mut sim = running(2.0, 1000.0, straight_route(10));
        let frame = sim.tick(DT).expect("running");
        assert!((frame.readout.traveled_m - 0.2).abs() < 1e-12);
        assert!((frame.readout.elapsed_s - 0.1).abs() < 1e-12);
        assert!(frame.passed.is_empty());
        assert_eq!(frame.position, ORIGIN);
        assert!(!frame.finished);
    }

    #[test]
    fn test_fast_tick_collects_every_passed_point() {
        // 400 m in one tick passes three ~111 m segments
        let mut sim = running(4000.0, 1000.0, straight_route(10));
        let frame = sim.tick(DT).expect("running");
        assert_eq!(frame.passed.len(), 3);
        assert_eq!(frame.position, frame.passed[2]);
        assert_eq!(sim.path().len(), 4);
        assert_eq!(sim.state().route_index, 3);
    }

    #[test]
    fn test_unusable_steps_are_ignored() {
        let mut sim = running(2.0, 300.0, straight_route(10));
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(sim.tick(dt).is_none());
        }
        assert_eq!(sim.state().traveled_m, 0.0);
        assert_eq!(sim.state().elapsed_s, 0.0);
        assert_eq!(sim.phase(), Phase::Running);
        assert!(sim.run_to_completion(0.0).is_empty());

        let frame = sim.tick(DT).expect("still running");
        assert!((frame.readout.traveled_m - 0.2).abs() < 1e-12);
        assert!(!frame.finished);
    }

    #[test]
    fn test_run_stops_at_target() {
        let mut sim = running(20.0, 150.0, straight_route(10));
        let frames = sim.run_to_completion(DT);
        let last = frames.last().expect("frames");
        assert!(last.finished);
        assert_eq!(last.readout.traveled_m, 150.0);
        assert_eq!(sim.phase(), Phase::Stopped);
        assert_eq!(sim.state().route_index, 1);
        assert_eq!(frames.len(), 75);
    }

    #[test]
    fn test_run_stops_at_route_end() {
        let route = straight_route(3);
        let end = route.route.last();
        let mut sim = running(20.0, 10_000.0, route);
        let frames = sim.run_to_completion(DT);
        assert!(frames.last().expect("frames").finished);
        assert_eq!(sim.position(), end);
        // target clamps to the route length when there is no destination
        assert!(sim.state().traveled_m <= sim.state().target_m);
    }

    #[test]
    fn test_stop_halts_ticks_and_keeps_position() {
        let mut sim = running(2000.0, 1000.0, straight_route(10));
        sim.tick(DT);
        let position = sim.position();
        assert!(sim.stop());
        assert!(!sim.stop());
        assert!(sim.tick(DT).is_none());
        assert_eq!(sim.position(), position);
        assert_eq!(sim.phase(), Phase::Stopped);
    }

    #[test]
    fn test_restart_from_stopped_begins_at_current_position() {
        let mut sim = running(2000.0, 1000.0, straight_route(10));
        sim.tick(DT);
        sim.stop();
        let here = sim.position();
        let ticket = sim.begin_start().expect("stopped can restart");
        assert_eq!(ticket.origin, here);
        assert_eq!(sim.path(), &[here]);
        assert_eq!(sim.state().traveled_m, 0.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut sim = running(2000.0, 1000.0, straight_route(10));
        sim.tick(DT);
        let home = GeoPoint::new(45.0, 5.0);
        sim.reset(home);
        assert_eq!(sim.phase(), Phase::Idle);
        assert_eq!(sim.position(), home);
        assert_eq!(sim.path(), &[home]);
        assert_eq!(sim.state().traveled_m, 0.0);
        assert_eq!(sim.state().elapsed_s, 0.0);
        assert!(sim.route().is_none());
    }

    #[test]
    fn test_destination_uses_route_distance() {
        let mut sim = Simulator::new(ORIGIN, 50.0, 100.0).expect("valid");
        let destination = GeoPoint::new(ORIGIN.lat + 0.002, ORIGIN.lon);
        sim.set_destination(Some(destination)).expect("idle");
        assert_eq!(sim.state().target_m, 222.0);

        let ticket = sim.begin_start().expect("idle");
        let mut generated = straight_route(3);
        generated.distance_m = 230.0;
        sim.commit_start(&ticket, generated).expect("route");
        assert_eq!(sim.state().target_m, 230.0);
        assert!(sim.set_target(10.0).is_err());
    }

    #[test]
    fn test_speed_change_applies_mid_run() {
        let mut sim = running(1.0, 1000.0, straight_route(10));
        sim.tick(DT);
        sim.set_speed(10.0).expect("positive");
        let frame = sim.tick(DT).expect("running");
        assert!((frame.readout.traveled_m - 1.1).abs() < 1e-9);
        assert!(sim.set_speed(f64::NAN).is_err());
    }

    #[test]
    fn test_readout_remaining() {
        let sim = Simulator::new(ORIGIN, 2.0, 100.0).expect("valid");
        let readout = sim.readout();
        assert_eq!(readout.remaining, "50s");
        assert_eq!(readout.zoom, 16);
        assert_eq!(readout.progress_percent, 0.0);
    }

    #[test]
    fn test_procedural_run_end_to_end() {
        let mut rng = XorShiftRng::seed_from_u64(9);
        let mut sim = Simulator::new(ORIGIN, 5.0, 100.0).expect("valid");
        let ticket = sim.begin_start().expect("idle");
        let generated = procedural_route(ticket.origin, ticket.target_m, &GeneratorConfig::default(), &mut rng);
        sim.commit_start(&ticket, generated).expect("route");
        let frames = sim.run_to_completion(DT);
        assert!(frames.last().expect("frames").finished);
        assert!(sim.state().traveled_m <= 100.0);
        assert!(sim.path().len() >= 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_traveled_never_exceeds_target(
                seed in any::<u64>(),
                speed in 1.0..50.0f64,
                target in 10.0..2000.0f64,
                dt in 0.05..1.0f64
            ) {
                let mut rng = XorShiftRng::seed_from_u64(seed);
                let mut sim = Simulator::new(ORIGIN, speed, target).expect("valid");
                let ticket = sim.begin_start().expect("idle");
                let generated = procedural_route(ticket.origin, ticket.target_m, &GeneratorConfig::default(), &mut rng);
                sim.commit_start(&ticket, generated).expect("route");

                let mut previous = 0.0;
                while let Some(frame) = sim.tick(dt) {
                    prop_assert!(frame.readout.traveled_m <= frame.readout.target_m);
                    prop_assert!(frame.readout.traveled_m >= previous);
                    previous = frame.readout.traveled_m;
                }
                prop_assert_eq!(sim.phase(), Phase::Stopped);
            }
        }
    }
}
