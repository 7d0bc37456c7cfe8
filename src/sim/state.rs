//! Game phase state machine
//!
//! Transitions are looked up in an explicit table keyed by (from, to, cause).
//! Anything not in the table is rejected and logged, never applied. Entering a
//! phase may toggle player input; the caller publishes the returned
//! [`InputChange`] on the event bus.

use serde::{Deserialize, Serialize};

use super::events::{GameEvent, InputDisabledReason};
use crate::error::{Result, SimError};

/// Current phase of play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GamePhase {
    /// Session created, no hole loaded yet
    #[default]
    Initializing,
    /// Ball at rest, waiting for a shot
    Aiming,
    /// Ball rolling after an accepted hit
    BallInMotion,
    /// Ball captured; terminal until the next hole loads
    HoleCompleted,
    /// Free camera look-around, toggled from Aiming
    AdInspecting,
}

/// The guard satisfied by a requested transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionCause {
    /// A new hole finished loading
    HoleLoaded,
    /// A hit command passed its preconditions
    HitAccepted,
    /// Ball stopped with no hole or hazard outcome
    BallSettled,
    /// Ball was put back on its safe position
    BallRestored,
    /// Zone detector confirmed capture
    HoleCaptured,
    /// Player toggled inspection mode
    ManualToggle,
}

use GamePhase::*;
use TransitionCause::*;

/// Every legal transition
const TRANSITIONS: &[(GamePhase, GamePhase, TransitionCause)] = &[
    (Initializing, Aiming, HoleLoaded),
    (Aiming, BallInMotion, HitAccepted),
    (BallInMotion, Aiming, BallSettled),
    (BallInMotion, Aiming, BallRestored),
    (BallInMotion, Aiming, HoleLoaded),
    (BallInMotion, HoleCompleted, HoleCaptured),
    (HoleCompleted, Aiming, HoleLoaded),
    (Aiming, AdInspecting, ManualToggle),
    (AdInspecting, Aiming, ManualToggle),
    (AdInspecting, Aiming, HoleLoaded),
];

/// Side effect of a transition on player input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputChange {
    Enabled,
    Disabled(InputDisabledReason),
}

impl InputChange {
    pub fn event(self) -> GameEvent {
        match self {
            InputChange::Enabled => GameEvent::InputEnabled,
            InputChange::Disabled(reason) => GameEvent::InputDisabled { reason },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStateMachine {
    phase: GamePhase,
    input_enabled: bool,
    transitions: u64,
}

impl GameStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Number of transitions applied so far
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    /// True if the table allows `from -> to` for `cause`
    pub fn is_legal(from: GamePhase, to: GamePhase, cause: TransitionCause) -> bool {
        TRANSITIONS
            .iter()
            .any(|&(f, t, c)| f == from && t == to && c == cause)
    }

    /// Apply a transition if the table and guards allow it
    pub fn request(
        &mut self,
        to: GamePhase,
        cause: TransitionCause,
    ) -> Result<Option<InputChange>> {
        let from = self.phase;
        let guard_ok = match (from, to) {
            (Aiming, AdInspecting) | (Aiming, BallInMotion) => self.input_enabled,
            _ => true,
        };
        if !guard_ok || !Self::is_legal(from, to, cause) {
            let err = SimError::InvalidTransition { from, to, cause };
            log::warn!("Rejected: {err}");
            return Err(err);
        }

        self.phase = to;
        self.transitions += 1;
        log::debug!("Phase {:?} -> {:?} ({:?})", from, to, cause);

        Ok(match to {
            Aiming => self.set_input_enabled(true),
            BallInMotion => self.disable_input(InputDisabledReason::BallInMotion),
            HoleCompleted => self.disable_input(InputDisabledReason::HoleCompleted),
            Initializing | AdInspecting => None,
        })
    }

    /// Toggle inspection mode from Aiming, or return to Aiming from it
    pub fn toggle_inspect(&mut self) -> Result<Option<InputChange>> {
        let to = if self.phase == AdInspecting {
            Aiming
        } else {
            AdInspecting
        };
        self.request(to, ManualToggle)
    }

    /// External input gate for collaborators (menus, overlays)
    pub fn set_input_enabled(&mut self, enabled: bool) -> Option<InputChange> {
        if enabled {
            if self.input_enabled {
                return None;
            }
            self.input_enabled = true;
            Some(InputChange::Enabled)
        } else {
            self.disable_input(InputDisabledReason::External)
        }
    }

    fn disable_input(&mut self, reason: InputDisabledReason) -> Option<InputChange> {
        if !self.input_enabled {
            return None;
        }
        self.input_enabled = false;
        Some(InputChange::Disabled(reason))
    }
}
