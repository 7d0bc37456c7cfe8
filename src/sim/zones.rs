//! Hazard and hole containment tests against static course geometry
//!
//! Boundary rules:
//! - Zone XZ bounds are inclusive on both edges (`min <= p <= max`).
//! - The water surface is exclusive: the ball is in water when `y < max.y`.
//! - A bunker's top is inclusive: the ball is in the bunker when `y <= max.y`.
//! - Hole capture uses strict comparisons for both radius and depth.

use std::rc::Rc;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::physics::GroundRect;
use crate::config::ZoneConfig;
use crate::error::SimError;
use crate::{horizontal, horizontal_distance};

/// Kinds of hazard zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardKind {
    Water,
    OutOfBounds,
    Bunker,
}

/// Axis-aligned box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inclusive containment on the ground plane only
    pub fn contains_xz(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }

    fn check(&self) -> Result<(), String> {
        if !(self.min.is_finite() && self.max.is_finite()) {
            return Err("bounds are not finite".to_string());
        }
        if self.min.cmpgt(self.max).any() {
            return Err(format!("min {} exceeds max {}", self.min, self.max));
        }
        Ok(())
    }
}

/// A penalty region on the current hole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardZone {
    pub kind: HazardKind,
    pub bounds: Aabb,
    #[serde(default)]
    pub penalty_strokes: u32,
}

/// The cup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoleTarget {
    pub position: Vec3,
    pub capture_radius: f32,
    pub capture_depth_below_surface: f32,
}

impl HoleTarget {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            capture_radius: crate::consts::HOLE_CAPTURE_RADIUS,
            capture_depth_below_surface: crate::consts::HOLE_CAPTURE_DEPTH,
        }
    }

    /// Horizontal distance strictly inside the capture radius
    pub fn within_radius(&self, ball: Vec3) -> bool {
        horizontal_distance(ball, self.position) < self.capture_radius
    }

    /// Strictly below the rim by more than the capture depth
    pub fn below_rim(&self, ball: Vec3) -> bool {
        ball.y < self.position.y - self.capture_depth_below_surface
    }
}

/// Read-only view of the current hole's static geometry
pub trait ZoneProvider {
    fn hazards(&self) -> &[HazardZone];
    fn hole_target(&self) -> HoleTarget;
    /// Global playfield rectangle; leaving it is out of bounds
    fn playfield(&self) -> GroundRect;
    /// Surface height the ball rests on
    fn ground_height(&self) -> f32 {
        0.0
    }
}

/// Static data for one hole, as supplied by the course collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleLayout {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_par")]
    pub par: u32,
    /// Ball center at spawn
    pub tee: Vec3,
    pub target: HoleTarget,
    pub playfield: GroundRect,
    #[serde(default)]
    pub hazards: Vec<HazardZone>,
    #[serde(default)]
    pub ground_height: f32,
}

fn default_par() -> u32 {
    3
}

impl ZoneProvider for HoleLayout {
    fn hazards(&self) -> &[HazardZone] {
        &self.hazards
    }

    fn hole_target(&self) -> HoleTarget {
        self.target
    }

    fn playfield(&self) -> GroundRect {
        self.playfield
    }

    fn ground_height(&self) -> f32 {
        self.ground_height
    }
}

/// A full course, in play order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub holes: Vec<Rc<HoleLayout>>,
}

impl Course {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SimError::Configuration(format!("invalid course JSON: {e}")))
    }

    pub fn hole(&self, index: usize) -> Option<Rc<HoleLayout>> {
        self.holes.get(index).cloned()
    }
}

/// Result of a hazard check that requires a penalty and reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardHit {
    pub kind: HazardKind,
    pub penalty: u32,
}

/// Bunker entry or exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BunkerTransition {
    Entered,
    Exited,
}

/// Containment tests for one hole
#[derive(Debug, Clone)]
pub struct ZoneDetector {
    zones: Vec<HazardZone>,
    target: HoleTarget,
    playfield: GroundRect,
    ground_height: f32,
    config: ZoneConfig,
    skipped: Vec<SimError>,
    in_bunker: bool,
}

impl ZoneDetector {
    /// Build from a hole's geometry. Malformed zones are logged and skipped.
    pub fn new(provider: &dyn ZoneProvider, config: ZoneConfig) -> Self {
        let mut zones = Vec::new();
        let mut skipped = Vec::new();
        for (index, zone) in provider.hazards().iter().enumerate() {
            match zone.bounds.check() {
                Ok(()) => zones.push(zone.clone()),
                Err(reason) => {
                    let err = SimError::Geometry {
                        zone: index,
                        reason,
                    };
                    log::warn!("{err}");
                    skipped.push(err);
                }
            }
        }

        Self {
            zones,
            target: provider.hole_target(),
            playfield: provider.playfield(),
            ground_height: provider.ground_height(),
            config,
            skipped,
            in_bunker: false,
        }
    }

    pub fn zones(&self) -> &[HazardZone] {
        &self.zones
    }

    /// Geometry errors raised while building the detector
    pub fn skipped(&self) -> &[SimError] {
        &self.skipped
    }

    pub fn target(&self) -> HoleTarget {
        self.target
    }

    pub fn playfield(&self) -> GroundRect {
        self.playfield
    }

    pub fn ground_height(&self) -> f32 {
        self.ground_height
    }

    pub fn in_bunker(&self) -> bool {
        self.in_bunker
    }

    fn zones_of(&self, kind: HazardKind) -> impl Iterator<Item = &HazardZone> {
        self.zones.iter().filter(move |z| z.kind == kind)
    }

    /// The water zone containing `pos`, if any
    pub fn water_at(&self, pos: Vec3) -> Option<&HazardZone> {
        self.zones_of(HazardKind::Water)
            .find(|z| z.bounds.contains_xz(pos) && pos.y < z.bounds.max.y)
    }

    pub fn is_in_water(&self, pos: Vec3) -> bool {
        self.water_at(pos).is_some()
    }

    /// Below the lost-ball floor
    pub fn is_lost(&self, pos: Vec3) -> bool {
        pos.y < self.config.lost_ball_floor
    }

    /// Outside the playfield, below the floor, or inside an explicit out-of-bounds zone
    pub fn is_out_of_bounds(&self, pos: Vec3) -> bool {
        self.out_of_bounds_penalty(pos).is_some()
    }

    fn out_of_bounds_penalty(&self, pos: Vec3) -> Option<u32> {
        if !self.playfield.contains(horizontal(pos)) || self.is_lost(pos) {
            return Some(self.config.out_of_bounds_penalty);
        }
        self.zones_of(HazardKind::OutOfBounds)
            .find(|z| z.bounds.contains_xz(pos))
            .map(|z| z.penalty_strokes)
    }

    pub fn is_in_bunker(&self, pos: Vec3) -> bool {
        self.zones_of(HazardKind::Bunker)
            .any(|z| z.bounds.contains_xz(pos) && pos.y <= z.bounds.max.y)
    }

    /// Inside any zone at all, bunkers included
    pub fn is_in_any_zone(&self, pos: Vec3) -> bool {
        self.is_in_water(pos) || self.is_out_of_bounds(pos) || self.is_in_bunker(pos)
    }

    /// Captured by the cup: close enough horizontally, and either at rest or
    /// already fallen below the rim.
    pub fn is_in_hole(&self, ball: Vec3, stopped: bool) -> bool {
        self.target.within_radius(ball) && (stopped || self.target.below_rim(ball))
    }

    /// First penalizing hazard at `pos`: water before out of bounds
    pub fn hazard_at(&self, pos: Vec3) -> Option<HazardHit> {
        if let Some(zone) = self.water_at(pos) {
            return Some(HazardHit {
                kind: HazardKind::Water,
                penalty: zone.penalty_strokes,
            });
        }
        self.out_of_bounds_penalty(pos).map(|penalty| HazardHit {
            kind: HazardKind::OutOfBounds,
            penalty,
        })
    }

    /// Edge-triggered bunker tracking; returns a transition only on entry or exit
    pub fn update_bunker(&mut self, pos: Vec3) -> Option<BunkerTransition> {
        let inside = self.is_in_bunker(pos);
        if inside == self.in_bunker {
            return None;
        }
        self.in_bunker = inside;
        Some(if inside {
            BunkerTransition::Entered
        } else {
            BunkerTransition::Exited
        })
    }

    /// Clamp a restore position into the playfield and onto the ground
    pub fn clamp_to_playfield(&self, pos: Vec3, radius: f32) -> Vec3 {
        let xz = self.playfield.clamp(Vec2::new(pos.x, pos.z));
        Vec3::new(xz.x, pos.y.max(self.ground_height + radius), xz.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn water() -> HazardZone {
        HazardZone {
            kind: HazardKind::Water,
            bounds: Aabb::new(Vec3::new(-5.0, -1.0, -5.0), Vec3::new(5.0, 0.1, 5.0)),
            penalty_strokes: 1,
        }
    }

    fn bunker() -> HazardZone {
        HazardZone {
            kind: HazardKind::Bunker,
            bounds: Aabb::new(Vec3::new(10.0, -1.0, 10.0), Vec3::new(12.0, 0.2, 14.0)),
            penalty_strokes: 0,
        }
    }

    fn layout(hazards: Vec<HazardZone>) -> HoleLayout {
        HoleLayout {
            name: "test".to_string(),
            par: 3,
            tee: Vec3::new(0.0, 0.05, 20.0),
            target: HoleTarget {
                position: Vec3::new(0.0, 0.0, -10.0),
                capture_radius: 0.3,
                capture_depth_below_surface: 0.1,
            },
            playfield: GroundRect::new(Vec2::splat(-30.0), Vec2::splat(30.0)),
            hazards,
            ground_height: 0.0,
        }
    }

    fn detector(hazards: Vec<HazardZone>) -> ZoneDetector {
        ZoneDetector::new(&layout(hazards), ZoneConfig::default())
    }

    #[test]
    fn test_water_requires_height_below_surface() {
        let zones = detector(vec![water()]);
        assert!(zones.is_in_water(Vec3::new(0.0, 0.05, 0.0)));
        assert!(!zones.is_in_water(Vec3::new(0.0, 0.1, 0.0)));
        assert!(!zones.is_in_water(Vec3::new(6.0, 0.05, 0.0)));
    }

    #[test]
    fn test_water_edge_is_inclusive() {
        let zones = detector(vec![water()]);
        assert!(zones.is_in_water(Vec3::new(5.0, 0.05, -5.0)));
        assert!(!zones.is_in_water(Vec3::new(5.0001, 0.05, 0.0)));
        assert!(!zones.is_in_water(Vec3::new(0.0, 0.05, -5.0001)));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut oob = water();
        oob.kind = HazardKind::OutOfBounds;
        oob.penalty_strokes = 2;
        let zones = detector(vec![oob]);

        assert!(zones.is_out_of_bounds(Vec3::new(31.0, 0.05, 0.0)));
        assert!(!zones.is_out_of_bounds(Vec3::new(30.0, 0.05, 0.0)));
        assert!(zones.is_out_of_bounds(Vec3::new(20.0, -6.0, 20.0)));
        assert_eq!(
            zones.hazard_at(Vec3::new(1.0, 0.05, 1.0)),
            Some(HazardHit {
                kind: HazardKind::OutOfBounds,
                penalty: 2
            })
        );
        assert_eq!(
            zones.hazard_at(Vec3::new(31.0, 0.05, 0.0)).map(|h| h.penalty),
            Some(crate::consts::OUT_OF_BOUNDS_PENALTY)
        );
    }

    #[test]
    fn test_hole_capture_dual_condition() {
        let zones = detector(vec![]);
        let rim = Vec3::new(0.2, 0.05, -10.0);
        // Slow roll-in: at rest inside the radius
        assert!(zones.is_in_hole(rim, true));
        assert!(!zones.is_in_hole(rim, false));
        // Fast drop-in: moving but fallen below the rim
        assert!(zones.is_in_hole(Vec3::new(0.1, -0.15, -10.0), false));
        // Exactly at the depth threshold is not below it
        assert!(!zones.is_in_hole(Vec3::new(0.1, -0.1, -10.0), false));
        // Outside the radius never counts
        assert!(!zones.is_in_hole(Vec3::new(0.3, -1.0, -10.0), true));
    }

    #[test]
    fn test_bunker_is_edge_triggered() {
        let mut zones = detector(vec![bunker()]);
        let outside = Vec3::new(9.0, 0.05, 12.0);
        let inside = Vec3::new(11.0, 0.05, 12.0);

        assert_eq!(zones.update_bunker(outside), None);
        assert_eq!(zones.update_bunker(inside), Some(BunkerTransition::Entered));
        for _ in 0..10 {
            assert_eq!(zones.update_bunker(inside), None);
        }
        assert_eq!(zones.update_bunker(outside), Some(BunkerTransition::Exited));
        assert_eq!(zones.update_bunker(outside), None);
    }

    #[test]
    fn test_bunker_is_not_a_penalty_hazard() {
        let zones = detector(vec![bunker()]);
        let inside = Vec3::new(11.0, 0.05, 12.0);
        assert!(zones.is_in_bunker(inside));
        assert!(zones.is_in_any_zone(inside));
        assert_eq!(zones.hazard_at(inside), None);
    }

    #[test]
    fn test_malformed_zone_is_skipped() {
        let mut broken = water();
        broken.bounds.min.x = 50.0;
        let mut nan = bunker();
        nan.bounds.max.z = f32::NAN;
        let zones = detector(vec![broken, water(), nan]);

        assert_eq!(zones.zones().len(), 1);
        assert_eq!(zones.skipped().len(), 2);
        assert!(matches!(zones.skipped()[0], SimError::Geometry { zone: 0, .. }));
        assert!(matches!(zones.skipped()[1], SimError::Geometry { zone: 2, .. }));
    }

    #[test]
    fn test_clamp_never_below_ground() {
        let zones = detector(vec![]);
        let clamped = zones.clamp_to_playfield(Vec3::new(40.0, -3.0, 0.0), 0.05);
        assert_eq!(clamped, Vec3::new(30.0, 0.05, 0.0));
    }

    #[test]
    fn test_layout_json() {
        let json = r#"{
            "tee": [0.0, 0.05, 5.0],
            "target": {
                "position": [0.0, 0.0, -5.0],
                "capture_radius": 0.3,
                "capture_depth_below_surface": 0.1
            },
            "playfield": { "min": [-10.0, -10.0], "max": [10.0, 10.0] },
            "hazards": [
                {
                    "kind": "Water",
                    "bounds": { "min": [1.0, -1.0, 1.0], "max": [2.0, 0.1, 2.0] },
                    "penalty_strokes": 1
                }
            ]
        }"#;
        let layout: HoleLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.par, 3);
        assert_eq!(layout.hazards[0].kind, HazardKind::Water);
    }

    proptest! {
        #[test]
        fn prop_edge_classification_consistent(t in -1.0f32..=1.0, side in 0usize..4) {
            // Any point on the boundary is inside; nudging outward leaves
            let zones = detector(vec![water()]);
            let along = t * 5.0;
            let (edge, out) = match side {
                0 => (Vec3::new(-5.0, 0.0, along), Vec3::new(-5.01, 0.0, along)),
                1 => (Vec3::new(5.0, 0.0, along), Vec3::new(5.01, 0.0, along)),
                2 => (Vec3::new(along, 0.0, -5.0), Vec3::new(along, 0.0, -5.01)),
                _ => (Vec3::new(along, 0.0, 5.0), Vec3::new(along, 0.0, 5.01)),
            };
            prop_assert!(zones.is_in_water(edge));
            prop_assert!(!zones.is_in_water(out));
        }
    }
}
