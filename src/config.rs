//! Simulation tuning values
//!
//! Loaded from JSON by the host; every section falls back to the defaults in
//! [`crate::consts`] so a partial document only overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Result, SimError};

/// Physical properties of the ball body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub radius: f32,
    pub mass: f32,
    /// Base linear damping (fraction of velocity lost per second)
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Physics material name; must be registered with the world
    pub material: String,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            radius: BALL_RADIUS,
            mass: BALL_MASS,
            linear_damping: BALL_LINEAR_DAMPING,
            angular_damping: BALL_ANGULAR_DAMPING,
            material: BALL_MATERIAL.to_string(),
        }
    }
}

/// Thresholds used to decide when the ball has stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub speed_threshold: f32,
    pub rotation_threshold: f32,
    pub debounce_ticks: u32,
    pub converge_damping: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed_threshold: STOP_SPEED_THRESHOLD,
            rotation_threshold: STOP_ROTATION_THRESHOLD,
            debounce_ticks: STOP_DEBOUNCE_TICKS,
            converge_damping: CONVERGE_DAMPING,
        }
    }
}

/// Zone-related tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub bunker_linear_damping: f32,
    pub lost_ball_floor: f32,
    /// Penalty for leaving the playfield rectangle or falling below the floor
    pub out_of_bounds_penalty: u32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            bunker_linear_damping: BUNKER_LINEAR_DAMPING,
            lost_ball_floor: LOST_BALL_FLOOR,
            out_of_bounds_penalty: OUT_OF_BOUNDS_PENALTY,
        }
    }
}

/// Power to impulse mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitConfig {
    pub max_impulse: f32,
    pub power_exponent: f32,
}

impl Default for HitConfig {
    fn default() -> Self {
        Self {
            max_impulse: MAX_HIT_IMPULSE,
            power_exponent: HIT_POWER_EXPONENT,
        }
    }
}

impl HitConfig {
    /// Impulse magnitude for a power in (0, 1]. Monotonic and never above `max_impulse`.
    pub fn impulse_for(&self, power: f32) -> f32 {
        self.max_impulse * power.clamp(0.0, 1.0).powf(self.power_exponent)
    }
}

/// Session-level behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub hazard_reset_delay_ticks: u32,
    pub max_events_per_dispatch: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hazard_reset_delay_ticks: HAZARD_RESET_DELAY_TICKS,
            max_events_per_dispatch: MAX_EVENTS_PER_DISPATCH,
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub ball: BallConfig,
    pub motion: MotionConfig,
    pub zones: ZoneConfig,
    pub hit: HitConfig,
    pub session: SessionConfig,
}

impl SimConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SimError::Configuration(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SimError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded simulation config from {}", path.display());
        Ok(config)
    }

    /// Reject values the simulation cannot work with
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, what: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(SimError::Configuration(what.to_string()))
            }
        }
        let damping = |d: f32| (0.0..1.0).contains(&d);

        check(self.ball.radius > 0.0, "ball.radius must be positive")?;
        check(self.ball.mass > 0.0, "ball.mass must be positive")?;
        check(damping(self.ball.linear_damping), "ball.linear_damping must be in [0, 1)")?;
        check(damping(self.ball.angular_damping), "ball.angular_damping must be in [0, 1)")?;
        check(self.motion.speed_threshold > 0.0, "motion.speed_threshold must be positive")?;
        check(
            self.motion.rotation_threshold > 0.0,
            "motion.rotation_threshold must be positive",
        )?;
        check(self.motion.debounce_ticks > 0, "motion.debounce_ticks must be at least 1")?;
        check(damping(self.motion.converge_damping), "motion.converge_damping must be in [0, 1)")?;
        check(
            damping(self.zones.bunker_linear_damping),
            "zones.bunker_linear_damping must be in [0, 1)",
        )?;
        check(self.hit.max_impulse > 0.0, "hit.max_impulse must be positive")?;
        check(self.hit.power_exponent > 0.0, "hit.power_exponent must be positive")?;
        check(
            self.session.max_events_per_dispatch > 0,
            "session.max_events_per_dispatch must be at least 1",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SimConfig::from_json(r#"{ "motion": { "debounce_ticks": 6 } }"#).unwrap();
        assert_eq!(config.motion.debounce_ticks, 6);
        assert_eq!(config.motion.speed_threshold, STOP_SPEED_THRESHOLD);
        assert_eq!(config.ball, BallConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = SimConfig::from_json(r#"{ "ball": { "mass": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));

        let err = SimConfig::from_json(r#"{ "zones": { "bunker_linear_damping": 1.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));

        assert!(SimConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_impulse_is_monotonic_and_bounded() {
        let hit = HitConfig {
            max_impulse: 2.0,
            power_exponent: 1.5,
        };
        let mut last = 0.0;
        for step in 1..=20 {
            let impulse = hit.impulse_for(step as f32 / 20.0);
            assert!(impulse > last);
            assert!(impulse <= hit.max_impulse);
            last = impulse;
        }
        assert_eq!(hit.impulse_for(1.0), 2.0);
        assert_eq!(hit.impulse_for(3.0), 2.0);
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let err = SimConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }
}
