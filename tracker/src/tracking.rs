//! Accumulating real GPS fixes into a traveled distance.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::TrackingConfig;
use crate::models::{Fix, FixOutcome, GeoPoint, SegmentStats, TrackUpdate};

/// Failure reported by a geolocation provider in place of a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderError {
    #[error("location provider unavailable")]
    Unavailable,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location request timed out")]
    Timeout,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrackingError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("invalid fix ({}, {})", .0.lat, .0.lon)]
    InvalidFix(GeoPoint),
    #[error("tracking session is not started")]
    NotTracking,
}

/// One line of a recorded provider stream: a fix or a failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProviderEvent {
    Fix(Fix),
    Failure { error: ProviderError },
}

impl From<ProviderEvent> for Result<Fix, ProviderError> {
    fn from(event: ProviderEvent) -> Self {
        match event {
            ProviderEvent::Fix(fix) => Ok(fix),
            ProviderEvent::Failure { error } => Err(error),
        }
    }
}

/// Running distance over accepted fixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTrack {
    last_fix: Option<Fix>,
    position: Option<GeoPoint>,
    total_distance_m: f64,
}

impl LiveTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    /// Reference fix the next sample is measured from.
    pub fn last_fix(&self) -> Option<&Fix> {
        self.last_fix.as_ref()
    }

    /// Latest reported position, including fixes that were not accumulated.
    pub fn position(&self) -> Option<GeoPoint> {
        self.position
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed one fix.
    ///
    /// Distance is always measured from the last accepted fix. Samples at or
    /// under the noise floor leave it in place, so slow drift still adds up
    /// once it clears the floor. A jump above the ceiling is reported as the
    /// position but neither counted nor accepted.
    pub fn accept(&mut self, fix: Fix, config: &TrackingConfig) -> TrackUpdate {
        let point = fix.point();
        self.position = Some(point);

        let Some(last) = self.last_fix else {
            self.last_fix = Some(fix);
            return self.update(point, None, FixOutcome::First, fix.speed, config);
        };

        let (outcome, segment) = match config.strategy.measure(last.point(), point) {
            None => {
                tracing::debug!("fix crossed into another UTM zone, sample skipped");
                self.last_fix = Some(fix);
                (FixOutcome::ZoneMismatch, None)
            }
            Some(distance_m) if distance_m > config.max_jump_m => {
                tracing::warn!("discarding GPS jump of {distance_m:.1} m");
                (FixOutcome::Jump, None)
            }
            Some(distance_m) if distance_m <= config.noise_floor_m => {
                (FixOutcome::BelowNoiseFloor, None)
            }
            Some(distance_m) => {
                let dt_s = (fix.timestamp_ms - last.timestamp_ms) as f64 / 1000.0;
                let calculated_speed = (dt_s > 0.0).then(|| distance_m / dt_s);
                self.total_distance_m += distance_m;
                self.last_fix = Some(fix);
                (
                    FixOutcome::Accumulated,
                    Some(SegmentStats {
                        distance_m,
                        dt_s,
                        calculated_speed,
                    }),
                )
            }
        };

        let speed = fix
            .speed
            .or_else(|| segment.and_then(|s| s.calculated_speed));
        self.update(point, segment, outcome, speed, config)
    }

    fn update(
        &self,
        position: GeoPoint,
        segment: Option<SegmentStats>,
        outcome: FixOutcome,
        speed: Option<f64>,
        config: &TrackingConfig,
    ) -> TrackUpdate {
        TrackUpdate {
            position,
            total_distance_m: self.total_distance_m,
            segment,
            moving: speed.is_some_and(|s| s > config.moving_speed_mps),
            outcome,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPhase {
    Idle,
    Tracking,
    Stopped,
}

/// A [`LiveTrack`] fed by a provider stream.
///
/// A provider failure stops the session; calling [`start`](Self::start)
/// again resumes on the same track.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    phase: TrackingPhase,
    track: LiveTrack,
    config: TrackingConfig,
}

impl TrackingSession {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            phase: TrackingPhase::Idle,
            track: LiveTrack::new(),
            config,
        }
    }

    pub fn phase(&self) -> TrackingPhase {
        self.phase
    }

    pub fn track(&self) -> &LiveTrack {
        &self.track
    }

    /// Returns false if already tracking.
    pub fn start(&mut self) -> bool {
        if self.phase == TrackingPhase::Tracking {
            return false;
        }
        self.phase = TrackingPhase::Tracking;
        tracing::info!("tracking started");
        true
    }

    pub fn stop(&mut self) -> bool {
        if self.phase != TrackingPhase::Tracking {
            return false;
        }
        self.phase = TrackingPhase::Stopped;
        tracing::info!(
            "tracking stopped after {:.1} m",
            self.track.total_distance_m()
        );
        true
    }

    /// Stop and forget everything accumulated so far.
    pub fn reset(&mut self) {
        self.phase = TrackingPhase::Idle;
        self.track.reset();
    }

    pub fn handle(&mut self, event: Result<Fix, ProviderError>) -> Result<TrackUpdate, TrackingError> {
        if self.phase != TrackingPhase::Tracking {
            return Err(TrackingError::NotTracking);
        }
        match event {
            Err(err) => {
                tracing::warn!("location provider failed: {err}");
                self.phase = TrackingPhase::Stopped;
                Err(err.into())
            }
            Ok(fix) if !fix.point().is_valid() => Err(TrackingError::InvalidFix(fix.point())),
            Ok(fix) => Ok(self.track.accept(fix, &self.config)),
        }
    }

    /// Start the session and consume `events` until the stream ends or the
    /// provider fails. Invalid fixes are skipped.
    pub async fn drive(
        &mut self,
        mut events: mpsc::Receiver<Result<Fix, ProviderError>>,
        mut on_update: impl FnMut(&TrackUpdate),
    ) -> Result<(), TrackingError> {
        self.start();
        while let Some(event) = events.recv().await {
            match self.handle(event) {
                Ok(update) => on_update(&update),
                Err(TrackingError::InvalidFix(point)) => {
                    tracing::warn!("skipping invalid fix ({}, {})", point.lat, point.lon);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
