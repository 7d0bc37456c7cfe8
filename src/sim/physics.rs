//! Rigid sphere body and the physics world capability
//!
//! The simulation core only needs one primitive: a sphere with velocity,
//! angular velocity, damping and a sleep flag. [`PhysicsWorld`] is the seam to
//! the external engine; [`GroundPlaneWorld`] is a small deterministic engine
//! (gravity plus a flat green) good enough to drive the core on its own.

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::BallConfig;
use crate::consts::GRAVITY;
use crate::error::{Result, SimError};

/// Everything needed to create the ball body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub position: Vec3,
    pub radius: f32,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub material: String,
}

impl BodyDesc {
    pub fn from_config(config: &BallConfig, position: Vec3) -> Self {
        Self {
            position,
            radius: config.radius,
            mass: config.mass,
            linear_damping: config.linear_damping,
            angular_damping: config.angular_damping,
            material: config.material.clone(),
        }
    }
}

/// Position and orientation handed to the renderer each tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

/// A simulated sphere
#[derive(Debug, Clone)]
pub struct PhysicsBody {
    position: Vec3,
    orientation: Quat,
    velocity: Vec3,
    angular_velocity: Vec3,
    radius: f32,
    mass: f32,
    linear_damping: f32,
    angular_damping: f32,
    restitution: f32,
    sleeping: bool,
}

impl PhysicsBody {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            orientation: self.orientation,
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.angular_velocity = angular_velocity;
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    /// Apply an instantaneous impulse through the center of mass (wakes the body)
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        self.velocity += impulse / self.mass;
        self.sleeping = false;
    }

    /// Zero both velocities exactly
    pub fn halt(&mut self) {
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }

    pub fn sleep(&mut self) {
        self.halt();
        self.sleeping = true;
    }

    pub fn wake(&mut self) {
        self.sleeping = false;
    }
}

/// Capability to create and advance the ball body
pub trait PhysicsWorld {
    /// Create a sphere body. Fails when the world cannot host it.
    fn create_sphere(&self, desc: &BodyDesc) -> Result<PhysicsBody>;

    /// Advance the body by `dt` seconds
    fn step(&self, body: &mut PhysicsBody, dt: f32);

    /// Move the resting surface for the hole about to be played
    fn set_ground_height(&mut self, height: f32);
}

/// A surface material registered with the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Fraction of normal speed kept after a bounce
    pub restitution: f32,
}

/// Axis-aligned rectangle on the ground plane (x, z)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl GroundRect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Inclusive on every edge
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn clamp(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }
}

/// Downward speed below which a landing does not bounce
const BOUNCE_MIN_SPEED: f32 = 0.2;
/// Height slack for treating the ball as resting on the ground
const CONTACT_EPSILON: f32 = 1e-4;

/// Gravity and a flat ground of optional finite extent
///
/// Off the edge of the ground the ball falls freely.
#[derive(Debug, Clone)]
pub struct GroundPlaneWorld {
    pub gravity: f32,
    pub ground_height: f32,
    pub extent: Option<GroundRect>,
    materials: Vec<Material>,
}

impl Default for GroundPlaneWorld {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            ground_height: 0.0,
            extent: None,
            materials: vec![Material {
                name: crate::consts::BALL_MATERIAL.to_string(),
                restitution: 0.3,
            }],
        }
    }
}

impl GroundPlaneWorld {
    /// A world with no registered materials
    pub fn empty() -> Self {
        Self {
            materials: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_extent(mut self, extent: GroundRect) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn register_material(&mut self, material: Material) {
        self.materials.retain(|m| m.name != material.name);
        self.materials.push(material);
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    fn supports(&self, position: Vec3) -> bool {
        self.extent
            .is_none_or(|rect| rect.contains(crate::horizontal(position)))
    }
}

impl PhysicsWorld for GroundPlaneWorld {
    fn create_sphere(&self, desc: &BodyDesc) -> Result<PhysicsBody> {
        let material = self.material(&desc.material).ok_or_else(|| {
            SimError::Configuration(format!(
                "physics material '{}' is not registered",
                desc.material
            ))
        })?;
        if !(desc.radius > 0.0 && desc.mass > 0.0) {
            return Err(SimError::Configuration(format!(
                "sphere needs positive radius and mass (radius {}, mass {})",
                desc.radius, desc.mass
            )));
        }
        if !desc.position.is_finite() {
            return Err(SimError::Configuration(
                "sphere spawn position is not finite".to_string(),
            ));
        }

        Ok(PhysicsBody {
            position: desc.position,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            radius: desc.radius,
            mass: desc.mass,
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
            restitution: material.restitution,
            sleeping: false,
        })
    }

    fn set_ground_height(&mut self, height: f32) {
        self.ground_height = height;
    }

    fn step(&self, body: &mut PhysicsBody, dt: f32) {
        if body.sleeping {
            return;
        }

        let rest_height = self.ground_height + body.radius;
        let supported = self.supports(body.position);
        let grounded = supported && body.position.y <= rest_height + CONTACT_EPSILON;

        // Damping first, as fraction of velocity lost per second
        body.velocity *= (1.0 - body.linear_damping).powf(dt);

        if grounded && body.velocity.y <= 0.0 {
            body.velocity.y = 0.0;
        } else {
            body.velocity.y -= self.gravity * dt;
        }

        body.position += body.velocity * dt;

        // Ground contact correction
        if supported && body.position.y < rest_height {
            body.position.y = rest_height;
            let bounce = -body.velocity.y * body.restitution;
            body.velocity.y = if bounce > BOUNCE_MIN_SPEED { bounce } else { 0.0 };
        }

        let on_ground = supported && body.position.y <= rest_height + CONTACT_EPSILON;
        if on_ground {
            // Rolling without slipping: w = up x v / r
            let v = body.velocity;
            body.angular_velocity = Vec3::new(v.z, 0.0, -v.x) / body.radius;
        } else {
            body.angular_velocity *= (1.0 - body.angular_damping).powf(dt);
        }

        let spin = body.angular_velocity * dt;
        if spin != Vec3::ZERO {
            body.orientation = (Quat::from_scaled_axis(spin) * body.orientation).normalize();
        }
    }
}
