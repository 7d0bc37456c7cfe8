//! The ball entity
//!
//! Owns its physics body exclusively and mirrors the body's transform into a
//! public pose once per tick for the renderer.

use std::rc::{Rc, Weak};

use glam::{Quat, Vec3};

use super::physics::{PhysicsBody, Pose};
use super::zones::{HoleLayout, HoleTarget};

#[derive(Debug, Clone)]
pub struct Ball {
    body: PhysicsBody,
    pose: Pose,
    velocity: Vec3,
    angular_velocity: Vec3,
    base_linear_damping: f32,
    bunker_linear_damping: f32,
    pub has_been_hit: bool,
    pub is_in_bunker: bool,
    pub is_hole_completed: bool,
    pub last_hit_position: Option<Vec3>,
    pub last_safe_position: Vec3,
    /// The hole this ball was spawned for; course data owns it
    current_hole: Weak<HoleLayout>,
}

impl Ball {
    pub fn new(body: PhysicsBody, bunker_linear_damping: f32, hole: &Rc<HoleLayout>) -> Self {
        let position = body.position();
        Self {
            pose: body.pose(),
            velocity: body.velocity(),
            angular_velocity: body.angular_velocity(),
            base_linear_damping: body.linear_damping(),
            bunker_linear_damping,
            has_been_hit: false,
            is_in_bunker: false,
            is_hole_completed: false,
            last_hit_position: None,
            last_safe_position: position,
            current_hole: Rc::downgrade(hole),
            body,
        }
    }

    pub fn body(&self) -> &PhysicsBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut PhysicsBody {
        &mut self.body
    }

    /// Copy the body transform into the public pose
    pub fn sync_pose(&mut self) {
        self.pose = self.body.pose();
        self.velocity = self.body.velocity();
        self.angular_velocity = self.body.angular_velocity();
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn orientation(&self) -> Quat {
        self.pose.orientation
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    pub fn radius(&self) -> f32 {
        self.body.radius()
    }

    pub fn base_linear_damping(&self) -> f32 {
        self.base_linear_damping
    }

    /// Damping for the surface the ball is currently on
    pub fn surface_damping(&self) -> f32 {
        if self.is_in_bunker {
            self.bunker_linear_damping
        } else {
            self.base_linear_damping
        }
    }

    /// Record bunker entry or exit and swap the body's damping to match
    pub fn set_in_bunker(&mut self, inside: bool) {
        self.is_in_bunker = inside;
        self.body.set_linear_damping(self.surface_damping());
    }

    /// Target of the hole this ball belongs to, while the hole data is alive
    pub fn current_hole_target(&self) -> Option<HoleTarget> {
        self.current_hole.upgrade().map(|hole| hole.target)
    }

    /// Teleport to `position` at rest
    pub fn place_at_rest(&mut self, position: Vec3) {
        self.body.set_position(position);
        self.body.sleep();
        self.sync_pose();
    }
}
