use std::{sync::Arc, time::Duration};

use tokio::sync::Notify;
use tracker::{
    clock::ManualClock,
    config::GeneratorConfig,
    models::{GeoPoint, Phase},
    osrm::{RoadRoute, RoadRouter, RouteFuture},
    runner::{RunnerError, SimulationHandle, StartOutcome},
    simulator::{SimulationError, Simulator, StartError},
};

const ORIGIN: GeoPoint = GeoPoint::new(45.0, 5.0);
const DESTINATION: GeoPoint = GeoPoint::new(45.003, 5.0);

/// Holds every request until released, then answers with a straight road.
struct GatedRoad {
    release: Arc<Notify>,
}

impl RoadRouter for GatedRoad {
    fn route<'a>(&'a self, origin: GeoPoint, destination: GeoPoint) -> RouteFuture<'a> {
        Box::pin(async move {
            self.release.notified().await;
            Ok(RoadRoute {
                points: vec![origin, destination],
                distance_m: 400.0,
            })
        })
    }
}

fn spawn_gated() -> (SimulationHandle, tracker::clock::TickSender, Arc<Notify>) {
    let release = Arc::new(Notify::new());
    let mut sim = Simulator::new(ORIGIN, 10.0, 100.0).unwrap();
    sim.set_destination(Some(DESTINATION)).unwrap();
    let (clock, ticks) = ManualClock::new(Duration::from_millis(100));
    let handle = SimulationHandle::spawn(
        sim,
        clock,
        Arc::new(GatedRoad {
            release: Arc::clone(&release),
        }),
        GeneratorConfig::default(),
        1,
    );
    (handle, ticks, release)
}

async fn wait_for_phase(handle: &SimulationHandle, phase: Phase) {
    let mut snapshots = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(1), snapshots.wait_for(|s| s.phase == phase))
        .await
        .expect("phase reached in time")
        .expect("runner alive");
}

#[tokio::test]
async fn stop_during_route_fetch_discards_late_route() {
    let (handle, ticks, release) = spawn_gated();

    let starter = handle.clone();
    let start = tokio::spawn(async move { starter.start().await });
    wait_for_phase(&handle, Phase::Starting).await;

    assert_eq!(handle.stop().await, Ok(true));
    assert_eq!(
        start.await.unwrap(),
        Err(RunnerError::Start(StartError::Cancelled))
    );

    release.notify_waiters();
    ticks.advance(10);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Stopped);
    assert_eq!(snapshot.position, ORIGIN);
    assert_eq!(snapshot.readout.traveled_m, 0.0);
}

#[tokio::test]
async fn concurrent_starts_leave_one_run() {
    let (handle, _ticks, release) = spawn_gated();

    let first = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.start().await })
    };
    wait_for_phase(&handle, Phase::Starting).await;
    assert_eq!(handle.start().await, Ok(StartOutcome::AlreadyActive));

    release.notify_one();
    assert_eq!(first.await.unwrap(), Ok(StartOutcome::Started));
    assert_eq!(handle.snapshot().phase, Phase::Running);
    // destination runs take the road distance as their target
    assert_eq!(handle.snapshot().readout.target_m, 400.0);
}

#[tokio::test]
async fn restart_after_cancel_uses_fresh_route() {
    let (handle, ticks, release) = spawn_gated();

    let starter = handle.clone();
    let cancelled = tokio::spawn(async move { starter.start().await });
    wait_for_phase(&handle, Phase::Starting).await;
    handle.reset(ORIGIN).await.unwrap();
    assert!(cancelled.await.unwrap().is_err());
    handle.set_destination(Some(DESTINATION)).await.unwrap();

    let starter = handle.clone();
    let fresh = tokio::spawn(async move { starter.start().await });
    wait_for_phase(&handle, Phase::Starting).await;
    release.notify_one();
    assert_eq!(fresh.await.unwrap(), Ok(StartOutcome::Started));

    let mut snapshots = handle.subscribe();
    ticks.advance(5);
    let snapshot = tokio::time::timeout(
        Duration::from_secs(1),
        snapshots.wait_for(|s| s.readout.traveled_m >= 5.0 - 1e-9),
    )
    .await
    .expect("ticks applied")
    .expect("runner alive")
    .clone();
    assert_eq!(snapshot.phase, Phase::Running);
    assert!(snapshot.readout.elapsed_s > 0.0);
}

#[tokio::test]
async fn speed_changes_while_running() {
    let (handle, ticks, release) = spawn_gated();
    release.notify_one();
    assert_eq!(handle.start().await, Ok(StartOutcome::Started));

    handle.set_speed(20.0).await.unwrap();
    let mut snapshots = handle.subscribe();
    ticks.advance(1);
    let snapshot = tokio::time::timeout(
        Duration::from_secs(1),
        snapshots.wait_for(|s| s.readout.elapsed_s > 0.0),
    )
    .await
    .expect("tick applied")
    .expect("runner alive")
    .clone();
    assert!((snapshot.readout.traveled_m - 2.0).abs() < 1e-9);
    assert_eq!(
        handle.set_target(10.0).await,
        Err(RunnerError::Simulation(SimulationError::RunActive))
    );
}
