//! Session context
//!
//! The one place session-scoped state lives. Components receive it by
//! reference; nothing reaches for a global.

use std::rc::Rc;

use glam::Vec3;

use super::ball::Ball;
use super::coordinator::{BallCoordinator, transition};
use super::events::{
    Dispatch, Envelope, EventBus, EventKind, EventSource, GameEvent, Generation, HandlerError,
    SubscriptionSet, SubscriptionToken,
};
use super::ledger::StrokeLedger;
use super::physics::{PhysicsWorld, Pose};
use super::state::{GamePhase, GameStateMachine, TransitionCause};
use super::zones::HoleLayout;
use crate::config::SimConfig;
use crate::consts::MAX_SUBSTEPS;
use crate::error::Result;

/// Shared mutable state handed to every event handler
#[derive(Debug, Default)]
pub struct SessionState {
    pub machine: GameStateMachine,
    pub ledger: StrokeLedger,
    /// Generation of the hole currently loaded
    pub generation: Generation,
    pub hole: Option<Rc<HoleLayout>>,
}

const RULES_CONTEXT: &str = "session-rules";

/// Ledger and state machine reactions, installed as ordinary subscriptions
fn install_rules(bus: &mut EventBus<SessionState>) -> SubscriptionSet {
    let mut rules = SubscriptionSet::new();

    rules.push(bus.subscribe(EventKind::HoleStarted, RULES_CONTEXT, |env, d| {
        let GameEvent::HoleStarted { generation } = env.event else {
            return Ok(());
        };
        if generation != d.state.generation {
            log::warn!("Ignoring stale HoleStarted for generation {}", generation.0);
            return Ok(());
        }
        let (name, par) = d
            .state
            .hole
            .as_ref()
            .map(|hole| (hole.name.clone(), hole.par))
            .unwrap_or_default();
        d.state.ledger.start_hole(generation, &name, par);
        Ok(())
    }));

    rules.push(bus.subscribe(EventKind::HoleStarted, RULES_CONTEXT, |env, d| {
        if d.state.machine.phase() == GamePhase::Aiming {
            return Ok(());
        }
        request(d, env.generation, GamePhase::Aiming, TransitionCause::HoleLoaded)
    }));

    rules.push(bus.subscribe(EventKind::HazardDetected, RULES_CONTEXT, |env, d| {
        let GameEvent::HazardDetected { penalty, .. } = env.event else {
            return Ok(());
        };
        if env.generation != d.state.generation {
            log::warn!("Ignoring penalty from stale generation {}", env.generation.0);
            return Ok(());
        }
        d.state.ledger.add_penalty(penalty);
        Ok(())
    }));

    rules.push(bus.subscribe(EventKind::HoleCompleted, RULES_CONTEXT, |env, d| {
        if env.generation != d.state.generation {
            log::warn!("Ignoring HoleCompleted from stale generation {}", env.generation.0);
            return Ok(());
        }
        if let Some(score) = d.state.ledger.complete_hole() {
            log::info!(
                "Hole '{}' complete: {} stroke(s), par {} ({})",
                score.hole,
                score.strokes,
                score.par,
                score.label()
            );
        }
        Ok(())
    }));

    rules
}

/// State machine request from inside a handler; input changes are queued
fn request(
    d: &mut Dispatch<'_, SessionState>,
    generation: Generation,
    to: GamePhase,
    cause: TransitionCause,
) -> Result<(), HandlerError> {
    let change = d
        .state
        .machine
        .request(to, cause)
        .map_err(|e| HandlerError::new(e.to_string()))?;
    if let Some(change) = change {
        d.publish(Envelope::new(change.event(), EventSource::StateMachine, generation));
    }
    Ok(())
}

/// A play session: one world, one ball at a time, many holes
pub struct Session<W: PhysicsWorld> {
    config: SimConfig,
    world: W,
    state: SessionState,
    bus: EventBus<SessionState>,
    coordinator: BallCoordinator,
    rules: SubscriptionSet,
    accumulator: f32,
}

impl<W: PhysicsWorld> Session<W> {
    pub fn new(config: SimConfig, world: W) -> Result<Self> {
        config.validate()?;
        let mut bus = EventBus::new(config.session.max_events_per_dispatch);
        let rules = install_rules(&mut bus);
        Ok(Self {
            coordinator: BallCoordinator::new(config.clone()),
            config,
            world,
            state: SessionState::default(),
            bus,
            rules,
            accumulator: 0.0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.machine.phase()
    }

    pub fn is_input_enabled(&self) -> bool {
        self.state.machine.is_input_enabled()
    }

    pub fn ledger(&self) -> &StrokeLedger {
        &self.state.ledger
    }

    pub fn generation(&self) -> Generation {
        self.state.generation
    }

    pub fn coordinator(&self) -> &BallCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut BallCoordinator {
        &mut self.coordinator
    }

    pub fn ball(&self) -> Option<&Ball> {
        self.coordinator.ball()
    }

    /// Ball pose for the renderer
    pub fn ball_pose(&self) -> Option<Pose> {
        self.coordinator.pose()
    }

    /// Load a hole: invalidates in-flight actions of the previous hole, then
    /// creates the ball and announces `HoleStarted`.
    pub fn load_hole(&mut self, layout: Rc<HoleLayout>) -> Result<Generation> {
        let generation = self.state.generation.next();
        self.state.generation = generation;
        self.state.hole = Some(Rc::clone(&layout));
        self.accumulator = 0.0;
        self.world.set_ground_height(layout.ground_height);

        if let Err(err) = self.coordinator.load_hole(&self.world, &layout, generation) {
            log::error!("Hole '{}' failed to load: {err}", layout.name);
            return Err(err);
        }

        self.bus.publish(
            Envelope::new(
                GameEvent::HoleStarted { generation },
                EventSource::Session,
                generation,
            ),
            &mut self.state,
        );
        Ok(generation)
    }

    /// One fixed simulation tick: physics step, ball update, queued events
    pub fn tick(&mut self, dt: f32) {
        self.coordinator.step_physics(&self.world, dt);
        self.coordinator.update(&mut self.state, &mut self.bus);
        self.bus.drain(&mut self.state);
    }

    /// Run as many fixed ticks as `frame_dt` covers, capped at `MAX_SUBSTEPS`.
    /// Returns the number of ticks run.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        let sim_dt = crate::consts::SIM_DT;
        self.accumulator += frame_dt.min(0.1);
        let mut substeps = 0;
        while self.accumulator >= sim_dt && substeps < MAX_SUBSTEPS {
            self.tick(sim_dt);
            self.accumulator -= sim_dt;
            substeps += 1;
        }
        substeps
    }

    /// Command surface: strike the ball
    pub fn hit(&mut self, direction: Vec3, power: f32) -> Result<()> {
        self.coordinator
            .hit(direction, power, &mut self.state, &mut self.bus)
    }

    /// Put the ball back on its last safe position
    pub fn reset_ball(&mut self) -> Result<Vec3> {
        self.coordinator
            .reset_to_safe_position(&mut self.state, &mut self.bus)
    }

    /// Toggle inspection mode (only from Aiming with input enabled)
    pub fn toggle_inspect(&mut self) -> Result<()> {
        let to = if self.phase() == GamePhase::AdInspecting {
            GamePhase::Aiming
        } else {
            GamePhase::AdInspecting
        };
        let generation = self.state.generation;
        transition(
            &mut self.bus,
            &mut self.state,
            generation,
            to,
            TransitionCause::ManualToggle,
        )
    }

    /// Let a collaborator gate player input
    pub fn set_input_enabled(&mut self, enabled: bool) {
        if let Some(change) = self.state.machine.set_input_enabled(enabled) {
            self.publish(Envelope::new(
                change.event(),
                EventSource::StateMachine,
                self.state.generation,
            ));
        }
    }

    /// Publish on behalf of a collaborator
    pub fn publish(&mut self, envelope: Envelope) {
        self.bus.publish(envelope, &mut self.state);
    }

    pub fn subscribe<F>(
        &mut self,
        kind: EventKind,
        context: impl Into<String>,
        handler: F,
    ) -> SubscriptionToken
    where
        F: FnMut(&Envelope, &mut Dispatch<'_, SessionState>) -> Result<(), HandlerError>
            + 'static,
    {
        self.bus.subscribe(kind, context, handler)
    }

    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        self.bus.unsubscribe(token)
    }

    pub fn bus(&self) -> &EventBus<SessionState> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus<SessionState> {
        &mut self.bus
    }

    /// Release the session's own subscriptions
    pub fn teardown(&mut self) -> usize {
        self.rules.release(&mut self.bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::error::SimError;
    use crate::sim::physics::{GroundPlaneWorld, GroundRect};
    use crate::sim::zones::HoleTarget;
    use glam::Vec2;
    use std::cell::RefCell;

    fn layout(name: &str) -> Rc<HoleLayout> {
        Rc::new(HoleLayout {
            name: name.to_string(),
            par: 3,
            tee: Vec3::new(0.0, 0.05, 0.0),
            target: HoleTarget::new(Vec3::new(20.0, 0.0, 20.0)),
            playfield: GroundRect::new(Vec2::splat(-30.0), Vec2::splat(30.0)),
            hazards: Vec::new(),
            ground_height: 0.0,
        })
    }

    fn session() -> Session<GroundPlaneWorld> {
        Session::new(SimConfig::default(), GroundPlaneWorld::default()).unwrap()
    }

    #[test]
    fn test_load_hole_enables_aiming() {
        let mut session = session();
        assert_eq!(session.phase(), GamePhase::Initializing);
        let generation = session.load_hole(layout("1")).unwrap();
        assert_eq!(generation, Generation(1));
        assert_eq!(session.phase(), GamePhase::Aiming);
        assert!(session.is_input_enabled());
        assert_eq!(session.ledger().hole_generation(), Some(Generation(1)));
    }

    #[test]
    fn test_load_failure_is_fatal_for_the_hole() {
        let mut session = Session::new(SimConfig::default(), GroundPlaneWorld::empty()).unwrap();
        let err = session.load_hole(layout("1")).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
        assert!(session.ball().is_none());
        assert_eq!(session.phase(), GamePhase::Initializing);
        assert!(session.hit(Vec3::NEG_Z, 0.5).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SimConfig::default();
        config.motion.debounce_ticks = 0;
        assert!(Session::new(config, GroundPlaneWorld::default()).is_err());
    }

    #[test]
    fn test_input_events_follow_transitions() {
        let mut session = session();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventKind::InputEnabled, EventKind::InputDisabled] {
            let seen = Rc::clone(&seen);
            session.subscribe(kind, "test", move |env, _| {
                seen.borrow_mut().push(env.event.clone());
                Ok(())
            });
        }

        session.load_hole(layout("1")).unwrap();
        session.hit(Vec3::NEG_Z, 0.2).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                GameEvent::InputEnabled,
                GameEvent::InputDisabled {
                    reason: crate::sim::events::InputDisabledReason::BallInMotion
                }
            ]
        );
    }

    #[test]
    fn test_inspect_toggle_and_external_gate() {
        let mut session = session();
        session.load_hole(layout("1")).unwrap();
        session.toggle_inspect().unwrap();
        assert_eq!(session.phase(), GamePhase::AdInspecting);
        session.toggle_inspect().unwrap();

        session.set_input_enabled(false);
        assert!(session.toggle_inspect().is_err());
        assert_eq!(session.phase(), GamePhase::Aiming);
    }

    #[test]
    fn test_stale_hole_completed_is_ignored() {
        let mut session = session();
        session.load_hole(layout("1")).unwrap();
        session.load_hole(layout("2")).unwrap();
        session.publish(Envelope::new(
            GameEvent::HoleCompleted { strokes: 0 },
            EventSource::Collaborator,
            Generation(1),
        ));
        assert!(!session.ledger().is_hole_completed());
        assert!(session.ledger().scorecard().is_empty());
    }

    /// Ground that ends at z = 15, leaving the cup at (20, 0, 20) over a drop
    fn cliff_world() -> GroundPlaneWorld {
        GroundPlaneWorld::default().with_extent(GroundRect::new(
            Vec2::splat(-30.0),
            Vec2::new(30.0, 15.0),
        ))
    }

    fn record_all<W: PhysicsWorld>(session: &mut Session<W>) -> Rc<RefCell<Vec<GameEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        for kind in EventKind::ALL {
            let seen = Rc::clone(&seen);
            session.subscribe(kind, "recorder", move |env, _| {
                seen.borrow_mut().push(env.event.clone());
                Ok(())
            });
        }
        seen
    }

    fn teleport<W: PhysicsWorld>(session: &mut Session<W>, position: Vec3) {
        let body = session
            .coordinator_mut()
            .ball_mut()
            .expect("ball")
            .body_mut();
        body.set_position(position);
        body.set_velocity(Vec3::ZERO);
    }

    #[test]
    fn test_hit_preconditions() {
        let mut session = session();
        assert!(matches!(
            session.hit(Vec3::NEG_Z, 0.5),
            Err(SimError::InvalidCommand(_))
        ));

        session.load_hole(layout("1")).unwrap();
        for (direction, power) in [
            (Vec3::NEG_Z, 0.0),
            (Vec3::NEG_Z, -0.2),
            (Vec3::NEG_Z, 1.5),
            (Vec3::NEG_Z, f32::NAN),
            (Vec3::Y, 0.5),
        ] {
            assert!(session.hit(direction, power).is_err());
        }
        assert_eq!(session.ledger().total_strokes(), 0);
        assert_eq!(session.phase(), GamePhase::Aiming);

        session.hit(Vec3::NEG_Z, 0.5).unwrap();
        assert!(matches!(
            session.hit(Vec3::NEG_Z, 0.5),
            Err(SimError::InvalidTransition { .. })
        ));
        assert_eq!(session.ledger().total_strokes(), 1);
    }

    #[test]
    fn test_hit_refused_while_input_gated() {
        let mut session = session();
        session.load_hole(layout("1")).unwrap();
        session.set_input_enabled(false);
        assert!(session.hit(Vec3::NEG_Z, 0.5).is_err());
        assert_eq!(session.ledger().total_strokes(), 0);

        session.set_input_enabled(true);
        assert!(session.hit(Vec3::NEG_Z, 0.5).is_ok());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = session();
        session.load_hole(layout("1")).unwrap();
        session.hit(Vec3::X, 0.8).unwrap();
        for _ in 0..10 {
            session.tick(SIM_DT);
        }

        let first = session.reset_ball().unwrap();
        let second = session.reset_ball().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Vec3::new(0.0, 0.05, 0.0));

        let ball = session.ball().unwrap();
        assert_eq!(ball.position(), first);
        assert_eq!(ball.velocity(), Vec3::ZERO);
        assert_eq!(ball.angular_velocity(), Vec3::ZERO);
        assert_eq!(session.phase(), GamePhase::Aiming);
        assert_eq!(session.ledger().total_strokes(), 1);
    }

    #[test]
    fn test_fast_drop_in_captures_before_stopping() {
        let mut session = Session::new(SimConfig::default(), cliff_world()).unwrap();
        session.load_hole(layout("1")).unwrap();
        let seen = record_all(&mut session);

        session.hit(Vec3::NEG_Z, 0.2).unwrap();
        teleport(&mut session, Vec3::new(20.0, 0.05, 20.0));
        for _ in 0..60 {
            session.tick(SIM_DT);
        }

        let in_hole = seen
            .borrow()
            .iter()
            .filter(|e| **e == GameEvent::BallInHole)
            .count();
        assert_eq!(in_hole, 1);
        assert!(!seen
            .borrow()
            .iter()
            .any(|e| matches!(e, GameEvent::BallStopped { .. })));
        assert_eq!(session.phase(), GamePhase::HoleCompleted);
        assert!(session.ledger().is_hole_completed());
        assert_eq!(session.ledger().scorecard().holes_played(), 1);
        assert!(session.ball().unwrap().is_hole_completed);
        assert!(session.reset_ball().is_err());
    }

    #[test]
    fn test_drop_past_lost_floor_down_the_cup_scores() {
        let mut session = Session::new(SimConfig::default(), cliff_world()).unwrap();
        session.load_hole(layout("1")).unwrap();
        let seen = record_all(&mut session);

        session.hit(Vec3::NEG_Z, 0.2).unwrap();
        teleport(&mut session, Vec3::new(20.0, -5.2, 20.0));
        session.tick(SIM_DT);

        assert_eq!(session.phase(), GamePhase::HoleCompleted);
        assert_eq!(session.ledger().total_strokes(), 1);
        assert!(!seen
            .borrow()
            .iter()
            .any(|e| matches!(e, GameEvent::HazardDetected { .. })));
    }

    #[test]
    fn test_hole_ground_height_reaches_the_world() {
        let raised = Rc::new(HoleLayout {
            tee: Vec3::new(0.0, 1.05, 0.0),
            ground_height: 1.0,
            ..(*layout("raised")).clone()
        });
        let mut session = session();
        session.load_hole(raised).unwrap();
        assert_eq!(session.world().ground_height, 1.0);

        for _ in 0..120 {
            session.tick(SIM_DT);
        }
        assert!((session.ball().unwrap().position().y - 1.05).abs() < 1e-5);

        session.hit(Vec3::X, 0.3).unwrap();
        for _ in 0..20 {
            session.tick(SIM_DT);
        }
        assert!((session.ball().unwrap().position().y - 1.05).abs() < 1e-5);
        let reset = session.reset_ball().unwrap();
        assert!((reset.y - 1.05).abs() < 1e-5);
    }

    #[test]
    fn test_moving_tick_publishes_ball_moved() {
        let mut session = session();
        session.load_hole(layout("1")).unwrap();
        let seen = record_all(&mut session);

        session.hit(Vec3::X, 0.5).unwrap();
        seen.borrow_mut().clear();
        session.tick(SIM_DT);

        let events = seen.borrow();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            GameEvent::BallMoved { velocity, .. } if velocity.x > 0.0
        ));
    }

    #[test]
    fn test_stale_pending_reset_is_discarded() {
        let mut config = SimConfig::default();
        config.session.hazard_reset_delay_ticks = 3;
        let mut session = Session::new(config, cliff_world()).unwrap();
        session.load_hole(layout("1")).unwrap();

        session.hit(Vec3::NEG_Z, 0.2).unwrap();
        teleport(&mut session, Vec3::new(25.0, 0.05, 25.0));
        for _ in 0..120 {
            session.tick(SIM_DT);
            if session.coordinator().pending_reset().is_some() {
                break;
            }
        }
        let pending = session.coordinator().pending_reset().expect("lost ball");
        assert_eq!(pending.generation, Generation(1));
        assert_eq!(session.ledger().total_strokes(), 2);

        let seen = record_all(&mut session);
        session.load_hole(layout("2")).unwrap();
        session.tick(SIM_DT);

        assert!(session.coordinator().pending_reset().is_none());
        assert!(!seen
            .borrow()
            .iter()
            .any(|e| matches!(e, GameEvent::BallReset { .. } | GameEvent::HazardDetected { .. })));
        assert_eq!(session.ball().unwrap().position(), Vec3::new(0.0, 0.05, 0.0));
        assert_eq!(session.phase(), GamePhase::Aiming);
        assert_eq!(session.ledger().current_hole_strokes(), 0);
    }

    #[test]
    fn test_delayed_reset_lands_after_countdown() {
        let mut config = SimConfig::default();
        config.session.hazard_reset_delay_ticks = 2;
        let mut session = Session::new(config, cliff_world()).unwrap();
        session.load_hole(layout("1")).unwrap();

        session.hit(Vec3::NEG_Z, 0.2).unwrap();
        teleport(&mut session, Vec3::new(25.0, 0.05, 25.0));
        while session.coordinator().pending_reset().is_none() {
            session.tick(SIM_DT);
        }
        session.tick(SIM_DT);
        session.tick(SIM_DT);
        assert!(session.coordinator().pending_reset().is_some());
        assert_eq!(session.phase(), GamePhase::BallInMotion);

        session.tick(SIM_DT);
        assert!(session.coordinator().pending_reset().is_none());
        assert_eq!(session.phase(), GamePhase::Aiming);
        assert_eq!(session.ball().unwrap().position(), Vec3::new(0.0, 0.05, 0.0));
    }

    #[test]
    fn test_advance_runs_whole_ticks() {
        let mut session = session();
        session.load_hole(layout("1")).unwrap();
        assert_eq!(session.advance(SIM_DT * 3.5), 3);
        // Long frames are clamped to 100ms
        assert_eq!(session.advance(1.0), 6);
    }

    #[test]
    fn test_teardown_releases_rules() {
        let mut session = session();
        assert_eq!(session.bus().total_subscribers(), 4);
        assert_eq!(session.teardown(), 4);
        assert_eq!(session.bus().total_subscribers(), 0);
    }
}
