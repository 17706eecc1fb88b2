//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust
//! use fatol::prelude::*;
//!
//! let breaker = CircuitBreaker::<DefaultPolicy, std::io::Error>::default();
//! assert_eq!(breaker.current_state(), State::Closed);
//! ```

pub use crate::{
    BreakerError, BreakerPolicy, BreakerResult, CircuitBreaker, DefaultPolicy, HookRegistry,
    MetricSink, Rejection, State,
};
