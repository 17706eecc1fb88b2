//! Circuit breaker states.

use std::fmt::{self, Display, Formatter};

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Circuit is closed and operations are allowed.
    #[default]
    Closed,

    /// Circuit is open and operations are rejected.
    Open,

    /// Circuit is allowing a limited number of operations to test recovery.
    HalfOpen,
}

impl State {
    /// Short label used for metric labels and log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            State::Closed => write!(f, "state is closed"),
            State::Open => write!(f, "state is open"),
            State::HalfOpen => write!(f, "state is half-open"),
        }
    }
}

/// A state change performed by the breaker, reported once the lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: State,
    pub(crate) to: State,
}
