//! Request lifecycle: capture → dispatch → await → settle.
//!
//! A single [`RequestLifecycle`] exists per session and is the only mutable
//! state shared between the request workers and the views. Each capture or
//! upload starts a new [`Generation`]. A response is published only if it
//! carries the current generation and the machine is still awaiting it.
//! Anything else belongs to a request the user already abandoned and is
//! dropped without being treated as a failure.
//!
//! ```text
//! Idle ──start──▶ Awaiting(g) ──ok(g)───▶ Settled(g, D)
//!   ▲                 │   └────err(g)───▶ Failed(g, e)
//!   │                 └─ response(g' ≠ g): stays Awaiting(g)
//!   └──clear── Settled / Failed ──start──▶ Awaiting(g + 1)
//! ```

use crate::detection::Detection;
use crate::error::RequestError;
use std::fmt;
use tracing::{debug, info, warn};

/// Monotonic identifier of one capture/upload attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for Generation {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which user action started a generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOrigin {
    Capture,
    Upload,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleState {
    Idle,
    Awaiting(Generation),
    Settled {
        generation: Generation,
        detections: Vec<Detection>,
    },
    Failed {
        generation: Generation,
        error: RequestError,
    },
}

/// Inputs to the state machine.
#[derive(Clone, Debug)]
pub enum LifecycleEvent {
    Start(RequestOrigin),
    ResponseOk {
        generation: Generation,
        detections: Vec<Detection>,
    },
    ResponseErr {
        generation: Generation,
        error: RequestError,
    },
    Clear,
}

/// What applying an event did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Started(Generation),
    Settled(Generation),
    Failed(Generation),
    Cleared,
    /// A response for a generation that is no longer awaited.
    Discarded,
    /// An event with no effect in the current state.
    Ignored,
}

impl Transition {
    /// Whether the published state changed.
    pub fn changed(self) -> bool {
        !matches!(self, Self::Discarded | Self::Ignored)
    }
}

#[derive(Debug)]
pub struct RequestLifecycle {
    current: Generation,
    origin: Option<RequestOrigin>,
    state: LifecycleState,
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self {
            current: Generation::default(),
            origin: None,
            state: LifecycleState::Idle,
        }
    }

    /// Applies one event. This is the only way the state changes.
    pub fn apply(&mut self, event: LifecycleEvent) -> Transition {
        match event {
            LifecycleEvent::Start(origin) => Transition::Started(self.start(origin)),
            LifecycleEvent::ResponseOk {
                generation,
                detections,
            } => self.resolve(generation, Ok(detections)),
            LifecycleEvent::ResponseErr { generation, error } => {
                self.resolve(generation, Err(error))
            }
            LifecycleEvent::Clear => self.clear(),
        }
    }

    /// Starts a new generation from any state.
    ///
    /// Previously settled detections and errors are dropped immediately so no
    /// stale overlay is shown while the new request is pending.
    pub fn start(&mut self, origin: RequestOrigin) -> Generation {
        self.current = self.current.next();
        self.origin = Some(origin);
        self.state = LifecycleState::Awaiting(self.current);
        info!(generation = self.current.value(), ?origin, "Started detection request");
        self.current
    }

    /// Settles the awaited generation with a response or a failure.
    pub fn resolve(
        &mut self,
        generation: Generation,
        outcome: Result<Vec<Detection>, RequestError>,
    ) -> Transition {
        if !self.is_awaiting(generation) {
            debug!(
                generation = generation.value(),
                current = self.current.value(),
                "Discarding response for an abandoned request"
            );
            return Transition::Discarded;
        }

        match outcome {
            Ok(detections) => {
                info!(
                    generation = generation.value(),
                    count = detections.len(),
                    "Detection request settled"
                );
                self.state = LifecycleState::Settled {
                    generation,
                    detections,
                };
                Transition::Settled(generation)
            }
            Err(error) => {
                warn!(generation = generation.value(), %error, "Detection request failed");
                self.state = LifecycleState::Failed { generation, error };
                Transition::Failed(generation)
            }
        }
    }

    /// Returns to `Idle` from `Settled` or `Failed`, keeping the generation.
    ///
    /// Has no effect while idle or awaiting a response.
    pub fn clear(&mut self) -> Transition {
        match self.state {
            LifecycleState::Settled { .. } | LifecycleState::Failed { .. } => {
                self.state = LifecycleState::Idle;
                Transition::Cleared
            }
            LifecycleState::Idle | LifecycleState::Awaiting(_) => Transition::Ignored,
        }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// The most recently started generation (zero before the first request).
    pub fn generation(&self) -> Generation {
        self.current
    }

    pub fn origin(&self) -> Option<RequestOrigin> {
        self.origin
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.current
    }

    pub fn is_awaiting(&self, generation: Generation) -> bool {
        matches!(self.state, LifecycleState::Awaiting(g) if g == generation && g == self.current)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, LifecycleState::Awaiting(_))
    }

    /// Detections to show; empty unless settled.
    pub fn detections(&self) -> &[Detection] {
        match &self.state {
            LifecycleState::Settled { detections, .. } => detections,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&RequestError> {
        match &self.state {
            LifecycleState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Results or an error are on screen, so clearing makes sense.
    pub fn has_results(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::Settled { .. } | LifecycleState::Failed { .. }
        )
    }
}
