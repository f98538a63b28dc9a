use thiserror::Error;

use crate::config::ConfigError;
use crate::osrm::RoutingError;
use crate::runner::RunnerError;
use crate::simulator::{SimulationError, StartError};
use crate::tracking::TrackingError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("routing service error: {0}")]
    Routing(#[from] RoutingError),
    #[error("unable to start movement: {0}")]
    Start(#[from] StartError),
    #[error("invalid simulation parameters: {0}")]
    Simulation(#[from] SimulationError),
    #[error("simulation runner error: {0}")]
    Runner(#[from] RunnerError),
    #[error("tracking error: {0}")]
    Tracking(#[from] TrackingError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
