//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - No wall-clock time, no global state
//! - Stable dispatch order (subscription order)
//! - No rendering, audio or input-device dependencies

pub mod ball;
pub mod coordinator;
pub mod events;
pub mod ledger;
pub mod motion;
pub mod physics;
pub mod session;
pub mod state;
pub mod zones;

pub use ball::Ball;
pub use coordinator::{BallCoordinator, PendingReset};
pub use events::{
    Dispatch, Envelope, EventBus, EventKind, EventSource, GameEvent, Generation, HandlerError,
    InputDisabledReason, SubscriptionSet, SubscriptionToken,
};
pub use ledger::StrokeLedger;
pub use motion::{MotionClassifier, MotionTransition};
pub use physics::{
    BodyDesc, GroundPlaneWorld, GroundRect, Material, PhysicsBody, PhysicsWorld, Pose,
};
pub use session::{Session, SessionState};
pub use state::{GamePhase, GameStateMachine, InputChange, TransitionCause};
pub use zones::{
    Aabb, BunkerTransition, Course, HazardHit, HazardKind, HazardZone, HoleLayout, HoleTarget,
    ZoneDetector, ZoneProvider,
};
