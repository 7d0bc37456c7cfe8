//! Putt Core - simulation core of a real-time mini-golf game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (ball physics, motion, zones, state, events)
//! - `config`: Data-driven tuning values
//! - `scorecard`: Per-hole results for the session
//! - `error`: Error taxonomy shared by every component

pub mod config;
pub mod error;
pub mod scorecard;
pub mod sim;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use scorecard::Scorecard;

use glam::{Vec2, Vec3};

/// Simulation constants and tuning defaults
///
/// Every threshold the simulation compares against lives here so that the
/// boundary behavior can be pinned by tests instead of hiding in literals.
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Gravity (m/s², applied along -Y)
    pub const GRAVITY: f32 = 9.82;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 0.05;
    pub const BALL_MASS: f32 = 0.45;
    /// Fraction of linear velocity lost per second on the green
    pub const BALL_LINEAR_DAMPING: f32 = 0.5;
    pub const BALL_ANGULAR_DAMPING: f32 = 0.5;
    pub const BALL_MATERIAL: &str = "ball";

    /// Per-axis linear speed below which the ball counts as still (m/s)
    pub const STOP_SPEED_THRESHOLD: f32 = 0.05;
    /// Per-axis angular speed below which the ball counts as still (rad/s).
    /// Matches the speed threshold for a rolling ball of `BALL_RADIUS`.
    pub const STOP_ROTATION_THRESHOLD: f32 = 1.0;
    /// Consecutive still ticks required before a stop is accepted
    pub const STOP_DEBOUNCE_TICKS: u32 = 4;
    /// Damping forced on a ball crawling below half the speed threshold
    pub const CONVERGE_DAMPING: f32 = 0.95;

    /// Damping while resting or rolling inside a bunker
    pub const BUNKER_LINEAR_DAMPING: f32 = 0.9;
    /// A ball below this height is lost regardless of where it is
    pub const LOST_BALL_FLOOR: f32 = -5.0;
    pub const OUT_OF_BOUNDS_PENALTY: u32 = 1;

    /// Impulse at full power (N·s)
    ///
    /// With the default mass and green damping a full-power putt rolls about
    /// 11.2 m. Callers that need an exact reach scale `hit.max_impulse`.
    pub const MAX_HIT_IMPULSE: f32 = 3.5;
    /// Power curve exponent (1.0 = linear)
    pub const HIT_POWER_EXPONENT: f32 = 1.0;

    /// Hole defaults
    pub const HOLE_CAPTURE_RADIUS: f32 = 0.3;
    pub const HOLE_CAPTURE_DEPTH: f32 = 0.1;

    /// Ticks between a hazard stop and the ball reset (0 = same tick)
    pub const HAZARD_RESET_DELAY_TICKS: u32 = 0;
    /// Maximum events drained by one dispatch before the queue is dropped
    pub const MAX_EVENTS_PER_DISPATCH: usize = 256;
}

/// Project a 3D position onto the ground plane (x, z)
#[inline]
pub fn horizontal(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Horizontal distance between two points, ignoring height
#[inline]
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    horizontal(a).distance(horizontal(b))
}

/// True when every component of `v` is strictly below `threshold` in magnitude
#[inline]
pub fn all_axes_below(v: Vec3, threshold: f32) -> bool {
    v.abs().max_element() < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_distance_ignores_height() {
        let a = Vec3::new(0.0, 5.0, 0.0);
        let b = Vec3::new(3.0, -2.0, 4.0);
        assert!((horizontal_distance(a, b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_full_power_reach_on_the_green() {
        use consts::*;
        let q = (1.0 - BALL_LINEAR_DAMPING).powf(SIM_DT);
        let reach = MAX_HIT_IMPULSE / BALL_MASS * SIM_DT * q / (1.0 - q);
        assert!(reach > 11.0 && reach < 11.3, "reach {reach}");
    }

    #[test]
    fn test_all_axes_below_is_strict() {
        assert!(all_axes_below(Vec3::new(0.049, -0.049, 0.0), 0.05));
        assert!(!all_axes_below(Vec3::new(0.0, 0.05, 0.0), 0.05));
        assert!(!all_axes_below(Vec3::new(0.0, 0.0, -0.05), 0.05));
    }

    #[test]
    fn test_rotation_threshold_matches_rolling_speed() {
        // A ball rolling exactly at the speed threshold spins at the rotation threshold
        let spin = consts::STOP_SPEED_THRESHOLD / consts::BALL_RADIUS;
        assert!((spin - consts::STOP_ROTATION_THRESHOLD).abs() < 1e-5);
    }
}
