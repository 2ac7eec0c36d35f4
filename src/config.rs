// Timeouts, topics, drivetrain calibration
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::drive::gyro::{
    DEFAULT_HEADING_HOLD_BAND, DEFAULT_SMOOTHING_WEIGHT, DEFAULT_VELOCITY_TO_ROTATION_SCALE,
    GyroFilterParams,
};
use crate::drive::position::PositionParams;
use crate::drive::units::UnitConverter;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Give up on an encoder move that hasn't finished after this long
pub const MOVE_TIMEOUT: Duration = Duration::from_secs(10);

// Zenoh key prefix; topics below are relative to it
pub const TOPIC_PREFIX: &str = "mecanum";
pub const TOPIC_CMD_DRIVE: &str = "cmd/drive"; // commands
pub const TOPIC_RT_WHEELS: &str = "rt/wheels"; // wheel powers
pub const TOPIC_HEALTH: &str = "state/health"; // health status

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Physical calibration of one chassis
///
/// Defaults describe a 28-tick motor on a 25:1 gearbox driving 4" wheels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub ticks_per_revolution: f64,
    pub gear_ratio: f64,
    /// Inches
    pub wheel_diameter: f64,
    /// Inches, used only by encoder turns
    pub turn_radius: f64,
    pub turn_ticks_per_arc_inch: f64,
    pub smoothing_weight: f64,
    /// deg/s of yaw per unit of rotation power
    pub velocity_to_rotation_scale: f64,
    /// Heading error in degrees at which heading hold saturates
    pub heading_hold_band: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            ticks_per_revolution: 28.0,
            gear_ratio: 25.0,
            wheel_diameter: 4.0,
            turn_radius: 13.5,
            turn_ticks_per_arc_inch: 140.0 / PI,
            smoothing_weight: DEFAULT_SMOOTHING_WEIGHT,
            velocity_to_rotation_scale: DEFAULT_VELOCITY_TO_ROTATION_SCALE,
            heading_hold_band: DEFAULT_HEADING_HOLD_BAND,
        }
    }
}

impl DriveConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("Loaded drive config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("ticks_per_revolution", self.ticks_per_revolution),
            ("gear_ratio", self.gear_ratio),
            ("wheel_diameter", self.wheel_diameter),
            ("turn_radius", self.turn_radius),
            ("turn_ticks_per_arc_inch", self.turn_ticks_per_arc_inch),
            ("velocity_to_rotation_scale", self.velocity_to_rotation_scale),
            ("heading_hold_band", self.heading_hold_band),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {}", value),
                });
            }
        }

        if !self.smoothing_weight.is_finite() || self.smoothing_weight < 0.0 {
            return Err(ConfigError::Invalid {
                field: "smoothing_weight",
                reason: format!("must be zero or positive, got {}", self.smoothing_weight),
            });
        }
        Ok(())
    }

    pub fn units(&self) -> UnitConverter {
        UnitConverter::new(self.ticks_per_revolution, self.gear_ratio, self.wheel_diameter)
    }

    pub fn filter_params(&self) -> GyroFilterParams {
        GyroFilterParams {
            smoothing_weight: self.smoothing_weight,
            velocity_to_rotation_scale: self.velocity_to_rotation_scale,
        }
    }

    pub fn position_params(&self) -> PositionParams {
        PositionParams {
            units: self.units(),
            turn_radius: self.turn_radius,
            turn_ticks_per_arc_inch: self.turn_ticks_per_arc_inch,
        }
    }
}

/// Settings for the outer control loop
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub loop_hz: u64,
    pub cmd_timeout: Duration,
    pub move_timeout: Duration,
    pub topic_prefix: String,
    pub drive: DriveConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            cmd_timeout: CMD_TIMEOUT,
            move_timeout: MOVE_TIMEOUT,
            topic_prefix: TOPIC_PREFIX.to_string(),
            drive: DriveConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.topic_prefix, suffix)
    }

    /// Loop period; a zero rate is treated as 1 Hz
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.loop_hz.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_match_reference_chassis() {
        let config = DriveConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.units().ticks_per_inch(), 700.0 / (4.0 * PI));
        assert_relative_eq!(config.turn_ticks_per_arc_inch, 140.0 / PI);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DriveConfig::from_json(r#"{ "wheel_diameter": 3.0, "turn_radius": 9.0 }"#)
            .unwrap();
        assert_eq!(config.wheel_diameter, 3.0);
        assert_eq!(config.turn_radius, 9.0);
        assert_eq!(config.gear_ratio, 25.0);
        assert_eq!(config.velocity_to_rotation_scale, 120.0);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let err = DriveConfig::from_json(r#"{ "wheel_diameter": 0.0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "wheel_diameter",
                ..
            }
        ));

        let err = DriveConfig::from_json(r#"{ "smoothing_weight": -1.0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "smoothing_weight",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = DriveConfig::from_json("{ wheel_diameter: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_topics_and_tick_period() {
        let config = RuntimeConfig::default();
        assert_eq!(config.topic(TOPIC_CMD_DRIVE), "mecanum/cmd/drive");
        assert_eq!(config.tick_period(), Duration::from_millis(20));
    }

    #[test]
    fn test_fast_loop_rate_keeps_nonzero_period() {
        let config = RuntimeConfig {
            loop_hz: 2000,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_micros(500));

        let config = RuntimeConfig {
            loop_hz: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_secs(1));
    }
}
