//! Debounced "ball has stopped" detection
//!
//! The classifier is edge-triggered: [`MotionClassifier::evaluate`] returns a
//! [`MotionTransition`] only on the tick the classification changes, so callers
//! run hole and hazard checks once per stop rather than once per still frame.

use serde::{Deserialize, Serialize};

use super::physics::PhysicsBody;
use crate::all_axes_below;
use crate::config::MotionConfig;

/// A change in the ball's motion classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionTransition {
    Started,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct MotionClassifier {
    config: MotionConfig,
    stopped: bool,
    /// Consecutive still evaluations while moving
    still_ticks: u32,
    converging: bool,
}

impl MotionClassifier {
    /// A classifier for a ball that starts at rest
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            stopped: true,
            still_ticks: 0,
            converging: false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// True while the adaptive convergence damping is applied
    pub fn is_converging(&self) -> bool {
        self.converging
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Treat the ball as moving from now on, whatever its current speed.
    /// Called when a hit is accepted so that even a feather-light tap
    /// produces a `Stopped` edge after the debounce window.
    pub fn mark_moving(&mut self) {
        self.stopped = false;
        self.still_ticks = 0;
        self.converging = false;
    }

    /// Treat the ball as at rest (used after teleporting it)
    pub fn mark_stopped(&mut self) {
        self.stopped = true;
        self.still_ticks = 0;
        self.converging = false;
    }

    /// True if both velocities are below their thresholds on every axis
    pub fn is_still(&self, body: &PhysicsBody) -> bool {
        all_axes_below(body.velocity(), self.config.speed_threshold)
            && all_axes_below(body.angular_velocity(), self.config.rotation_threshold)
    }

    /// Classify the body after a physics step.
    ///
    /// `base_damping` is the damping the ball should have on its current
    /// surface. While a moving ball crawls below half the speed threshold the
    /// body's damping is raised to the convergence value; on the stop edge it
    /// is restored and both velocities are snapped to exactly zero.
    pub fn evaluate(
        &mut self,
        body: &mut PhysicsBody,
        base_damping: f32,
    ) -> Option<MotionTransition> {
        let still = self.is_still(body);

        if self.stopped {
            if still {
                return None;
            }
            self.stopped = false;
            self.still_ticks = 0;
            self.apply_damping(body, base_damping);
            return Some(MotionTransition::Started);
        }

        if still {
            self.still_ticks += 1;
        } else {
            self.still_ticks = 0;
        }

        if self.still_ticks >= self.config.debounce_ticks {
            self.stopped = true;
            self.still_ticks = 0;
            self.converging = false;
            body.set_linear_damping(base_damping);
            body.halt();
            return Some(MotionTransition::Stopped);
        }

        self.apply_damping(body, base_damping);
        None
    }

    fn apply_damping(&mut self, body: &mut PhysicsBody, base_damping: f32) {
        self.converging = body.velocity().length() < self.config.speed_threshold * 0.5;
        let damping = if self.converging {
            base_damping.max(self.config.converge_damping)
        } else {
            base_damping
        };
        body.set_linear_damping(damping);
    }
}
