//! Per-tick orchestration of the ball
//!
//! Order within one tick, after the physics step:
//! 1. mirror the body pose
//! 2. run a due hazard reset, dropping it if the hole changed meanwhile
//! 3. while in motion: bunker edges, fast drop-in, lost-ball floor
//! 4. motion classification; on the stop edge: hole, then hazards, else
//!    record the safe position and go back to aiming

use std::rc::Rc;

use glam::Vec3;

use super::ball::Ball;
use super::events::{Envelope, EventBus, EventSource, GameEvent, Generation};
use super::motion::{MotionClassifier, MotionTransition};
use super::physics::{BodyDesc, PhysicsWorld, Pose};
use super::session::SessionState;
use super::state::{GamePhase, TransitionCause};
use super::zones::{BunkerTransition, HazardHit, HazardKind, HoleLayout, ZoneDetector};
use crate::config::SimConfig;
use crate::error::{Result, SimError};

/// A hazard reset waiting for its delay to elapse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReset {
    pub generation: Generation,
    pub ticks_left: u32,
}

#[derive(Debug)]
pub struct BallCoordinator {
    config: SimConfig,
    ball: Option<Ball>,
    zones: Option<ZoneDetector>,
    classifier: MotionClassifier,
    generation: Generation,
    pending_reset: Option<PendingReset>,
}

fn emit(
    bus: &mut EventBus<SessionState>,
    state: &mut SessionState,
    generation: Generation,
    source: EventSource,
    event: GameEvent,
) {
    bus.publish(Envelope::new(event, source, generation), state);
}

/// Request a phase change and announce any input side effect
pub(crate) fn transition(
    bus: &mut EventBus<SessionState>,
    state: &mut SessionState,
    generation: Generation,
    to: GamePhase,
    cause: TransitionCause,
) -> Result<()> {
    if let Some(change) = state.machine.request(to, cause)? {
        emit(bus, state, generation, EventSource::StateMachine, change.event());
    }
    Ok(())
}

impl BallCoordinator {
    pub fn new(config: SimConfig) -> Self {
        Self {
            classifier: MotionClassifier::new(config.motion.clone()),
            config,
            ball: None,
            zones: None,
            generation: Generation::default(),
            pending_reset: None,
        }
    }

    pub fn ball(&self) -> Option<&Ball> {
        self.ball.as_ref()
    }

    pub fn ball_mut(&mut self) -> Option<&mut Ball> {
        self.ball.as_mut()
    }

    pub fn zones(&self) -> Option<&ZoneDetector> {
        self.zones.as_ref()
    }

    pub fn classifier(&self) -> &MotionClassifier {
        &self.classifier
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn pending_reset(&self) -> Option<PendingReset> {
        self.pending_reset
    }

    /// Pose for the renderer
    pub fn pose(&self) -> Option<Pose> {
        self.ball.as_ref().map(Ball::pose)
    }

    /// Replace the ball and zone data for a new hole.
    ///
    /// The previous ball is destroyed first; on failure no ball exists until
    /// the next successful load.
    pub fn load_hole(
        &mut self,
        world: &dyn PhysicsWorld,
        layout: &Rc<HoleLayout>,
        generation: Generation,
    ) -> Result<()> {
        self.generation = generation;
        self.ball = None;
        self.zones = None;
        self.classifier = MotionClassifier::new(self.config.motion.clone());

        let desc = BodyDesc::from_config(&self.config.ball, layout.tee);
        let body = world.create_sphere(&desc)?;
        let zones = ZoneDetector::new(layout.as_ref(), self.config.zones.clone());
        let mut ball = Ball::new(body, self.config.zones.bunker_linear_damping, layout);
        ball.last_safe_position = zones.clamp_to_playfield(layout.tee, ball.radius());

        log::info!(
            "Hole '{}' loaded (generation {}), {} hazard zone(s)",
            layout.name,
            generation.0,
            zones.zones().len()
        );
        self.ball = Some(ball);
        self.zones = Some(zones);
        Ok(())
    }

    /// Advance the ball body by one physics step
    pub fn step_physics(&mut self, world: &dyn PhysicsWorld, dt: f32) {
        if let Some(ball) = self.ball.as_mut() {
            world.step(ball.body_mut(), dt);
        }
    }

    /// Strike the ball. Rejected as a no-op unless aiming with a ball and a
    /// power in (0, 1].
    pub fn hit(
        &mut self,
        direction: Vec3,
        power: f32,
        state: &mut SessionState,
        bus: &mut EventBus<SessionState>,
    ) -> Result<()> {
        let rejected = |reason: String| {
            let err = SimError::InvalidCommand(reason);
            log::warn!("Hit ignored: {err}");
            Err(err)
        };
        if self.ball.is_none() {
            return rejected("no ball on the course".to_string());
        }
        if !(power > 0.0 && power <= 1.0) {
            return rejected(format!("power {power} outside (0, 1]"));
        }
        let flat = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
        if flat == Vec3::ZERO {
            return rejected("direction has no horizontal component".to_string());
        }

        transition(
            bus,
            state,
            self.generation,
            GamePhase::BallInMotion,
            TransitionCause::HitAccepted,
        )?;

        let Some(ball) = self.ball.as_mut() else {
            return rejected("no ball on the course".to_string());
        };
        let impulse = flat * self.config.hit.impulse_for(power);
        let position = ball.position();
        ball.body_mut().apply_impulse(impulse);
        ball.has_been_hit = true;
        ball.last_hit_position = Some(position);
        self.classifier.mark_moving();
        state.ledger.record_stroke();
        log::debug!(
            "Hit at {} with power {:.2} (impulse {:.3}), stroke {}",
            position,
            power,
            impulse.length(),
            state.ledger.current_hole_strokes()
        );

        emit(
            bus,
            state,
            self.generation,
            EventSource::Ball,
            GameEvent::BallHit { power, position },
        );
        Ok(())
    }

    /// Run once per tick after the physics step
    pub fn update(&mut self, state: &mut SessionState, bus: &mut EventBus<SessionState>) {
        let generation = self.generation;
        let Some(ball) = self.ball.as_mut() else {
            return;
        };
        ball.sync_pose();

        if let Some(pending) = self.pending_reset {
            if pending.generation != generation {
                log::warn!(
                    "Discarding reset from generation {} (now {})",
                    pending.generation.0,
                    generation.0
                );
                self.pending_reset = None;
            } else if pending.ticks_left > 0 {
                self.pending_reset = Some(PendingReset {
                    ticks_left: pending.ticks_left - 1,
                    ..pending
                });
                return;
            } else {
                self.restore(state, bus);
                return;
            }
        }

        if state.machine.phase() != GamePhase::BallInMotion || ball.is_hole_completed {
            return;
        }
        let Some(zones) = self.zones.as_mut() else {
            return;
        };
        let position = ball.position();

        if let Some(edge) = zones.update_bunker(position) {
            let event = match edge {
                BunkerTransition::Entered => {
                    ball.set_in_bunker(true);
                    GameEvent::BunkerEntered { position }
                }
                BunkerTransition::Exited => {
                    ball.set_in_bunker(false);
                    GameEvent::BunkerExited { position }
                }
            };
            emit(bus, state, generation, EventSource::Ball, event);
        }

        // Hole before hazards: a ball dropping down the cup can pass the lost floor
        if zones.is_in_hole(position, false) {
            self.hole_outcome(state, bus);
            return;
        }

        if zones.is_lost(position) {
            let hit = HazardHit {
                kind: HazardKind::OutOfBounds,
                penalty: self.config.zones.out_of_bounds_penalty,
            };
            self.hazard_outcome(hit, state, bus);
            return;
        }

        // A hit always marks the classifier moving, so only the stop edge matters here
        let base_damping = ball.surface_damping();
        let edge = self.classifier.evaluate(ball.body_mut(), base_damping);
        if edge == Some(MotionTransition::Stopped) {
            ball.body_mut().sleep();
            ball.sync_pose();
            let stopped = GameEvent::BallStopped { position };
            emit(bus, state, generation, EventSource::Ball, stopped);
            self.settle(position, state, bus);
        } else {
            let velocity = ball.velocity();
            emit(
                bus,
                state,
                generation,
                EventSource::Ball,
                GameEvent::BallMoved { position, velocity },
            );
        }
    }

    /// Zone checks on the stop edge, in priority order
    fn settle(
        &mut self,
        position: Vec3,
        state: &mut SessionState,
        bus: &mut EventBus<SessionState>,
    ) {
        let Some(zones) = self.zones.as_ref() else {
            return;
        };
        if zones.is_in_hole(position, true) {
            self.hole_outcome(state, bus);
            return;
        }
        if let Some(hit) = zones.hazard_at(position) {
            self.hazard_outcome(hit, state, bus);
            return;
        }

        let outside_all = !zones.is_in_any_zone(position);
        if let Some(ball) = self.ball.as_mut() {
            if outside_all {
                ball.last_safe_position = position;
            }
            log::debug!("Ball settled at {} (safe: {})", position, outside_all);
        }
        // Rejection is logged by the machine; nothing else to undo
        let generation = self.generation;
        let _ = transition(bus, state, generation, GamePhase::Aiming, TransitionCause::BallSettled);
    }

    fn hole_outcome(&mut self, state: &mut SessionState, bus: &mut EventBus<SessionState>) {
        let generation = self.generation;
        if let Some(ball) = self.ball.as_mut() {
            ball.is_hole_completed = true;
            ball.body_mut().sleep();
            ball.sync_pose();
        }
        self.classifier.mark_stopped();

        let strokes = state.ledger.current_hole_strokes();
        log::info!("Ball in hole after {} stroke(s)", strokes);
        emit(bus, state, generation, EventSource::Ball, GameEvent::BallInHole);
        let to = GamePhase::HoleCompleted;
        let _ = transition(bus, state, generation, to, TransitionCause::HoleCaptured);
        emit(bus, state, generation, EventSource::Ball, GameEvent::HoleCompleted { strokes });
    }

    fn hazard_outcome(
        &mut self,
        hit: HazardHit,
        state: &mut SessionState,
        bus: &mut EventBus<SessionState>,
    ) {
        let generation = self.generation;
        let Some(ball) = self.ball.as_mut() else {
            return;
        };
        let last_safe_position = ball.last_safe_position;
        ball.body_mut().sleep();
        ball.sync_pose();
        self.classifier.mark_stopped();

        log::info!(
            "{:?} hazard: +{} penalty, returning to {}",
            hit.kind,
            hit.penalty,
            last_safe_position
        );
        emit(
            bus,
            state,
            generation,
            EventSource::Ball,
            GameEvent::HazardDetected {
                kind: hit.kind,
                penalty: hit.penalty,
                last_safe_position,
            },
        );

        let delay = self.config.session.hazard_reset_delay_ticks;
        if delay == 0 {
            self.restore(state, bus);
        } else {
            self.pending_reset = Some(PendingReset {
                generation,
                ticks_left: delay,
            });
        }
    }

    /// Put the ball back on its last safe position at rest.
    ///
    /// Idempotent: repeated calls land on the same position with zero velocity.
    pub fn reset_to_safe_position(
        &mut self,
        state: &mut SessionState,
        bus: &mut EventBus<SessionState>,
    ) -> Result<Vec3> {
        match self.ball.as_ref() {
            None => Err(SimError::InvalidCommand("no ball on the course".to_string())),
            Some(ball) if ball.is_hole_completed => Err(SimError::InvalidCommand(
                "ball is already in the hole".to_string(),
            )),
            Some(_) => Ok(self.restore(state, bus)),
        }
    }

    fn restore(&mut self, state: &mut SessionState, bus: &mut EventBus<SessionState>) -> Vec3 {
        let generation = self.generation;
        self.pending_reset = None;
        let (Some(ball), Some(zones)) = (self.ball.as_mut(), self.zones.as_mut()) else {
            return Vec3::ZERO;
        };

        let target = zones.clamp_to_playfield(ball.last_safe_position, ball.radius());
        ball.last_safe_position = target;
        ball.place_at_rest(target);
        self.classifier.mark_stopped();

        let bunker_edge = zones.update_bunker(target);
        if let Some(edge) = bunker_edge {
            ball.set_in_bunker(edge == BunkerTransition::Entered);
        }
        let damping = ball.surface_damping();
        ball.body_mut().set_linear_damping(damping);

        match bunker_edge {
            Some(BunkerTransition::Entered) => emit(
                bus,
                state,
                generation,
                EventSource::Ball,
                GameEvent::BunkerEntered { position: target },
            ),
            Some(BunkerTransition::Exited) => emit(
                bus,
                state,
                generation,
                EventSource::Ball,
                GameEvent::BunkerExited { position: target },
            ),
            None => {}
        }
        emit(bus, state, generation, EventSource::Ball, GameEvent::BallReset { position: target });

        if state.machine.phase() == GamePhase::BallInMotion {
            let cause = TransitionCause::BallRestored;
            let _ = transition(bus, state, generation, GamePhase::Aiming, cause);
        }
        target
    }
}
