//! Synchronous typed publish/subscribe
//!
//! Events are a closed enum; subscribers register per [`EventKind`] and the
//! dispatch table is an array indexed by kind. Handlers receive the shared
//! session state `C` by mutable reference plus a [`Dispatch`] handle through
//! which they may publish further events. Those events are queued and
//! delivered only after the current dispatch completes, in FIFO order, with a
//! cap on how many one drain may deliver so a handler chain cannot run away.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::zones::HazardKind;
use crate::consts::MAX_EVENTS_PER_DISPATCH;
use crate::error::SimError;

/// Per-hole-load counter used to discard stale actions
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// Why player input was turned off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputDisabledReason {
    BallInMotion,
    HoleCompleted,
    /// A collaborator (menu, overlay) turned input off
    External,
}

/// Everything the core announces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    BallHit {
        power: f32,
        position: Vec3,
    },
    BallMoved {
        position: Vec3,
        velocity: Vec3,
    },
    BallStopped {
        position: Vec3,
    },
    BallReset {
        position: Vec3,
    },
    HazardDetected {
        kind: HazardKind,
        penalty: u32,
        last_safe_position: Vec3,
    },
    BallInHole,
    HoleCompleted {
        strokes: u32,
    },
    HoleStarted {
        generation: Generation,
    },
    InputEnabled,
    InputDisabled {
        reason: InputDisabledReason,
    },
    BunkerEntered {
        position: Vec3,
    },
    BunkerExited {
        position: Vec3,
    },
}

/// Discriminant of [`GameEvent`], used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    BallHit,
    BallMoved,
    BallStopped,
    BallReset,
    HazardDetected,
    BallInHole,
    HoleCompleted,
    HoleStarted,
    InputEnabled,
    InputDisabled,
    BunkerEntered,
    BunkerExited,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::BallHit,
        EventKind::BallMoved,
        EventKind::BallStopped,
        EventKind::BallReset,
        EventKind::HazardDetected,
        EventKind::BallInHole,
        EventKind::HoleCompleted,
        EventKind::HoleStarted,
        EventKind::InputEnabled,
        EventKind::InputDisabled,
        EventKind::BunkerEntered,
        EventKind::BunkerExited,
    ];
    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::BallHit { .. } => EventKind::BallHit,
            GameEvent::BallMoved { .. } => EventKind::BallMoved,
            GameEvent::BallStopped { .. } => EventKind::BallStopped,
            GameEvent::BallReset { .. } => EventKind::BallReset,
            GameEvent::HazardDetected { .. } => EventKind::HazardDetected,
            GameEvent::BallInHole => EventKind::BallInHole,
            GameEvent::HoleCompleted { .. } => EventKind::HoleCompleted,
            GameEvent::HoleStarted { .. } => EventKind::HoleStarted,
            GameEvent::InputEnabled => EventKind::InputEnabled,
            GameEvent::InputDisabled { .. } => EventKind::InputDisabled,
            GameEvent::BunkerEntered { .. } => EventKind::BunkerEntered,
            GameEvent::BunkerExited { .. } => EventKind::BunkerExited,
        }
    }
}

/// Who published an event. Opaque to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    Ball,
    StateMachine,
    Session,
    Collaborator,
}

/// An event as delivered to handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: GameEvent,
    pub source: EventSource,
    /// Hole generation the event was produced under
    pub generation: Generation,
}

impl Envelope {
    pub fn new(event: GameEvent, source: EventSource, generation: Generation) -> Self {
        Self {
            event,
            source,
            generation,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

/// Failure reported by a handler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What a handler sees of the bus while it runs
pub struct Dispatch<'a, C> {
    pub state: &'a mut C,
    queue: &'a mut VecDeque<Envelope>,
}

impl<C> Dispatch<'_, C> {
    /// Queue an event for delivery after the current dispatch completes
    pub fn publish(&mut self, envelope: Envelope) {
        self.queue.push_back(envelope);
    }
}

pub type Handler<C> =
    Box<dyn FnMut(&Envelope, &mut Dispatch<'_, C>) -> Result<(), HandlerError>>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    kind: EventKind,
    id: u64,
}

impl SubscriptionToken {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// All the subscriptions one component holds, released together
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    tokens: Vec<SubscriptionToken>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: SubscriptionToken) {
        self.tokens.push(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Unsubscribe every token; returns how many were still active
    pub fn release<C>(&mut self, bus: &mut EventBus<C>) -> usize {
        self.tokens
            .drain(..)
            .filter(|&token| bus.unsubscribe(token))
            .count()
    }
}

struct Subscriber<C> {
    id: u64,
    context: String,
    handler: Handler<C>,
}

/// Handler failures kept for inspection
const MAX_RECORDED_FAILURES: usize = 64;

pub struct EventBus<C> {
    table: [Vec<Subscriber<C>>; EventKind::COUNT],
    queue: VecDeque<Envelope>,
    next_id: u64,
    max_events_per_dispatch: usize,
    failures: VecDeque<SimError>,
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self::new(MAX_EVENTS_PER_DISPATCH)
    }
}

impl<C> EventBus<C> {
    pub fn new(max_events_per_dispatch: usize) -> Self {
        Self {
            table: std::array::from_fn(|_| Vec::new()),
            queue: VecDeque::new(),
            next_id: 1,
            max_events_per_dispatch: max_events_per_dispatch.max(1),
            failures: VecDeque::new(),
        }
    }

    /// Register `handler` for events of `kind`. `context` names the subscriber in logs.
    pub fn subscribe<F>(
        &mut self,
        kind: EventKind,
        context: impl Into<String>,
        handler: F,
    ) -> SubscriptionToken
    where
        F: FnMut(&Envelope, &mut Dispatch<'_, C>) -> Result<(), HandlerError> + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.table[kind.index()].push(Subscriber {
            id,
            context: context.into(),
            handler: Box::new(handler),
        });
        SubscriptionToken { kind, id }
    }

    /// Returns false if the token was already released
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let subscribers = &mut self.table[token.kind.index()];
        let before = subscribers.len();
        subscribers.retain(|s| s.id != token.id);
        subscribers.len() != before
    }

    /// Drop every subscription registered under `context`
    pub fn unsubscribe_context(&mut self, context: &str) -> usize {
        let mut removed = 0;
        for subscribers in &mut self.table {
            let before = subscribers.len();
            subscribers.retain(|s| s.context != context);
            removed += before - subscribers.len();
        }
        removed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.table[kind.index()].len()
    }

    pub fn total_subscribers(&self) -> usize {
        self.table.iter().map(Vec::len).sum()
    }

    /// Events waiting for the next drain
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Publish and deliver synchronously, along with anything handlers publish in response
    pub fn publish(&mut self, envelope: Envelope, state: &mut C) {
        self.queue.push_back(envelope);
        self.drain(state);
    }

    /// Queue without delivering; the next [`EventBus::drain`] picks it up
    pub fn post(&mut self, envelope: Envelope) {
        self.queue.push_back(envelope);
    }

    /// Deliver queued events in FIFO order until the queue is empty or the
    /// per-dispatch cap is reached. Returns the number delivered.
    pub fn drain(&mut self, state: &mut C) -> usize {
        let Self {
            table,
            queue,
            max_events_per_dispatch,
            failures,
            ..
        } = self;

        let mut delivered = 0;
        while let Some(envelope) = queue.pop_front() {
            if delivered >= *max_events_per_dispatch {
                log::error!(
                    "Event chain exceeded {} deliveries; dropping {} queued events",
                    max_events_per_dispatch,
                    queue.len() + 1
                );
                queue.clear();
                break;
            }
            delivered += 1;

            let kind = envelope.kind();
            for subscriber in table[kind.index()].iter_mut() {
                let mut dispatch = Dispatch {
                    state: &mut *state,
                    queue: &mut *queue,
                };
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    (subscriber.handler)(&envelope, &mut dispatch)
                }));
                let reason = match outcome {
                    Ok(Ok(())) => continue,
                    Ok(Err(err)) => err.0,
                    Err(payload) => panic_message(payload.as_ref()),
                };
                let err = SimError::EventHandler {
                    kind,
                    context: subscriber.context.clone(),
                    reason,
                };
                log::warn!("{err}");
                if failures.len() == MAX_RECORDED_FAILURES {
                    failures.pop_front();
                }
                failures.push_back(err);
            }
        }
        delivered
    }

    /// Handler failures since the last call
    pub fn take_failures(&mut self) -> Vec<SimError> {
        self.failures.drain(..).collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

impl<C> std::fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EventBus({} subscribers, {} queued)",
            self.total_subscribers(),
            self.queue.len()
        )
    }
}
