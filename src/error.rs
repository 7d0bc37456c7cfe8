//! Error taxonomy
//!
//! Construction-time errors are fatal for the operation that raised them (a
//! hole that fails to load stays unloaded). Everything raised during a tick is
//! logged and recovered where it happens.

use crate::sim::events::EventKind;
use crate::sim::state::{GamePhase, TransitionCause};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// Physics world, material, or tuning values unusable at creation time
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A state change that the transition table does not allow
    #[error("invalid transition {from:?} -> {to:?} ({cause:?})")]
    InvalidTransition {
        from: GamePhase,
        to: GamePhase,
        cause: TransitionCause,
    },

    /// A command whose preconditions failed (no ball, power out of range)
    #[error("command rejected: {0}")]
    InvalidCommand(String),

    /// Malformed hazard geometry; the zone is skipped for the hole
    #[error("hazard zone {zone} skipped: {reason}")]
    Geometry { zone: usize, reason: String },

    /// A subscriber failed while handling an event
    #[error("handler '{context}' failed on {kind:?}: {reason}")]
    EventHandler {
        kind: EventKind,
        context: String,
        reason: String,
    },
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;
