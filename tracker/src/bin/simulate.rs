use std::{fs::File, io::BufWriter, path::PathBuf, sync::Arc};

use clap::Parser;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker::{
    clock::IntervalClock,
    config::EngineConfig,
    gpx_export::write_path_as_gpx,
    models::{GeoPoint, Phase},
    osrm::{OfflineRouter, OsrmClient, RoadRouter},
    routing::generate_route,
    runner::SimulationHandle,
    simulator::Simulator,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Simulate a trip along a generated route")]
struct Args {
    /// Start latitude (defaults to the configured origin)
    #[arg(long)]
    lat: Option<f64>,
    #[arg(long)]
    lon: Option<f64>,

    /// Target distance in meters
    #[arg(long)]
    distance: Option<f64>,

    /// Speed in meters per second
    #[arg(long)]
    speed: Option<f64>,

    /// Pin a destination; the target becomes the distance to it
    #[arg(long, requires = "dest_lon")]
    dest_lat: Option<f64>,
    #[arg(long, requires = "dest_lat")]
    dest_lon: Option<f64>,

    /// Seed for the synthetic route generator
    #[arg(long)]
    seed: Option<u64>,

    /// Never ask the road routing service
    #[arg(long)]
    offline: bool,

    /// Tick on the wall clock instead of computing every frame at once
    #[arg(long)]
    realtime: bool,

    /// Write the traveled path to this GPX file
    #[arg(long)]
    gpx: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;

    let origin = GeoPoint::new(
        args.lat.unwrap_or(config.default_origin.lat),
        args.lon.unwrap_or(config.default_origin.lon),
    );
    let destination = args.dest_lat.zip(args.dest_lon).map(|(lat, lon)| GeoPoint::new(lat, lon));
    let mut sim = Simulator::new(
        origin,
        args.speed.unwrap_or(config.default_speed_mps),
        args.distance.unwrap_or(config.default_target_m),
    )?;
    sim.set_destination(destination)?;

    let router: Arc<dyn RoadRouter> = if args.offline || !config.routing.enabled {
        Arc::new(OfflineRouter)
    } else {
        Arc::new(OsrmClient::new(config.routing.base_url.clone(), config.routing.timeout())?)
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!("simulating from ({}, {}) with seed {seed}", origin.lat, origin.lon);

    let path = if args.realtime {
        run_realtime(sim, router, &config, seed).await?
    } else {
        run_at_once(sim, router.as_ref(), &config, seed).await?
    };

    if let Some(output) = &args.gpx {
        write_path_as_gpx(&path, "simulated run", BufWriter::new(File::create(output)?))?;
        tracing::info!("traveled path written to {:?}", output);
    }
    Ok(())
}

async fn run_at_once(
    mut sim: Simulator,
    router: &dyn RoadRouter,
    config: &EngineConfig,
    seed: u64,
) -> Result<Vec<GeoPoint>, Box<dyn std::error::Error>> {
    let Some(ticket) = sim.begin_start() else {
        return Err("simulator is already running".into());
    };
    let mut rng = XorShiftRng::seed_from_u64(seed);
    let generated = generate_route(
        router,
        &mut rng,
        ticket.origin,
        ticket.target_m,
        ticket.destination,
        &config.generator,
    )
    .await;
    sim.commit_start(&ticket, generated)?;

    for frame in sim.run_to_completion(config.tick_period().as_secs_f64()) {
        println!("{}", serde_json::to_string(&frame)?);
    }
    let readout = sim.readout();
    tracing::info!(
        "traveled {:.1} of {:.1} m in {:.1} s",
        readout.traveled_m,
        readout.target_m,
        readout.elapsed_s
    );
    Ok(sim.path().to_vec())
}

async fn run_realtime(
    sim: Simulator,
    router: Arc<dyn RoadRouter>,
    config: &EngineConfig,
    seed: u64,
) -> Result<Vec<GeoPoint>, Box<dyn std::error::Error>> {
    let handle = SimulationHandle::spawn(
        sim,
        IntervalClock::new(config.tick_period()),
        router,
        config.generator,
        seed,
    );
    let mut snapshots = handle.subscribe();
    handle.start().await?;

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        println!("{}", serde_json::to_string(&snapshot.readout)?);
        if snapshot.phase == Phase::Stopped {
            return Ok(snapshot.path);
        }
        snapshots.changed().await?;
    }
}
