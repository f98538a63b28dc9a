use std::{fs, path::PathBuf};

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker::{
    config::EngineConfig,
    distance::DistanceStrategy,
    tracking::{ProviderEvent, TrackingSession},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Replay recorded GPS fixes through a live track")]
struct Args {
    /// JSON-lines file: one fix or `{"error": ...}` per line
    input: PathBuf,

    /// Measure along the great circle instead of in the UTM plane
    #[arg(long)]
    great_circle: bool,

    /// Discard samples longer than this many meters
    #[arg(long)]
    max_jump: Option<f64>,

    /// Ignore samples at or below this many meters
    #[arg(long)]
    noise_floor: Option<f64>,
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
    let mut config = EngineConfig::from_env()?;
    if args.great_circle {
        config.tracking.strategy = DistanceStrategy::GreatCircle;
    }
    if let Some(max_jump) = args.max_jump {
        config.tracking.max_jump_m = max_jump;
    }
    if let Some(noise_floor) = args.noise_floor {
        config.tracking.noise_floor_m = noise_floor;
    }
    config.validate()?;
    let tracking = config.tracking;

    let content = fs::read_to_string(&args.input)?;
    let mut events = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ProviderEvent>(line) {
            Ok(event) => events.push(event),
            Err(err) => tracing::warn!("line {}: skipping unreadable event: {err}", number + 1),
        }
    }
    tracing::info!("replaying {} events from {:?}", events.len(), args.input);

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        for event in events {
            if tx.send(event.into()).await.is_err() {
                break;
            }
        }
    });

    let mut session = TrackingSession::new(tracking);
    let result = session
        .drive(rx, |update| match serde_json::to_string(update) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!("unable to print update: {err}"),
        })
        .await;

    tracing::info!(
        "total distance {:.1} m",
        session.track().total_distance_m()
    );
    result?;
    Ok(())
}
