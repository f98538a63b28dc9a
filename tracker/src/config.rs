use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::distance::DistanceStrategy;
use crate::models::GeoPoint;

const CONFIG_PATH_VAR: &str = "TRACKER_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Shape of synthetic routes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub step_m: f64,
    pub turn_probability: f64,
    pub steer_damping: f64,
    pub jitter_probability: f64,
    /// Total jitter span in degrees, centered on zero.
    pub jitter_span_deg: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            step_m: 10.0,
            turn_probability: 0.15,
            steer_damping: 0.3,
            jitter_probability: 0.1,
            jitter_span_deg: 30.0,
        }
    }
}

/// Filtering applied to live GPS fixes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub max_jump_m: f64,
    pub noise_floor_m: f64,
    pub moving_speed_mps: f64,
    pub strategy: DistanceStrategy,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_jump_m: 100.0,
            noise_floor_m: 2.0,
            moving_speed_mps: 0.05,
            strategy: DistanceStrategy::Planar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingServiceConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub enabled: bool,
}

impl Default for RoutingServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".to_string(),
            timeout_ms: 5_000,
            enabled: true,
        }
    }
}

impl RoutingServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_ms: u64,
    pub default_speed_mps: f64,
    pub default_target_m: f64,
    pub default_origin: GeoPoint,
    pub bind: String,
    pub generator: GeneratorConfig,
    pub tracking: TrackingConfig,
    pub routing: RoutingServiceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            default_speed_mps: 2.0,
            default_target_m: 100.0,
            default_origin: GeoPoint::new(14.5995, 120.9842),
            bind: "0.0.0.0:8080".to_string(),
            generator: GeneratorConfig::default(),
            tracking: TrackingConfig::default(),
            routing: RoutingServiceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults, then the JSON file named by `TRACKER_CONFIG`, then the
    /// `OSRM_URL`, `OSRM_TIMEOUT_MS` and `TRACKER_BIND` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(url) = std::env::var("OSRM_URL") {
            config.routing.base_url = url;
        }
        if let Ok(raw) = std::env::var("OSRM_TIMEOUT_MS") {
            config.routing.timeout_ms = raw.parse().map_err(|_| ConfigError::Invalid {
                name: "OSRM_TIMEOUT_MS",
                reason: format!("not an integer: {raw}"),
            })?;
        }
        if let Ok(bind) = std::env::var("TRACKER_BIND") {
            config.bind = bind;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(invalid("tick_ms", "must be positive"));
        }
        positive("default_speed_mps", self.default_speed_mps)?;
        positive("generator.step_m", self.generator.step_m)?;
        probability("generator.turn_probability", self.generator.turn_probability)?;
        probability("generator.steer_damping", self.generator.steer_damping)?;
        probability("generator.jitter_probability", self.generator.jitter_probability)?;
        positive("tracking.max_jump_m", self.tracking.max_jump_m)?;
        non_negative("tracking.noise_floor_m", self.tracking.noise_floor_m)?;
        non_negative("tracking.moving_speed_mps", self.tracking.moving_speed_mps)?;
        if !self.default_target_m.is_finite() || self.default_target_m < 0.0 {
            return Err(invalid("default_target_m", "must be a non-negative number"));
        }
        if !self.default_origin.is_valid() {
            return Err(invalid("default_origin", "latitude or longitude out of range"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, "must be a positive number"))
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, "must be a non-negative number"))
    }
}

fn probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, "must lie in [0, 1]"))
    }
}
