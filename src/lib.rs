//! # fatol
//!
//! A mutex-guarded, observability-ready Circuit Breaker for Rust applications.
//!
//! A breaker wraps calls to a downstream operation, tracks their outcomes, and
//! decides before every call whether to run it, refuse it, or let it through
//! as one of a bounded number of trials.
//!
//! ## States
//!
//! - **Closed**: Normal operation. Calls pass through to the protected resource.
//! - **Open**: Calls are immediately rejected without attempting to reach the resource.
//! - **Half-Open**: Once the open interval has elapsed, up to `max_requests` trial
//!   calls are let through in total. Half-open has no window of its own, so the
//!   budget is only renewed by leaving the state. A failed trial opens the
//!   circuit again. With a `success_threshold` (capped at `max_requests`) enough
//!   successful trials close it. Without a threshold, a breaker whose trials all
//!   succeed stays half-open and rejects further calls with `RequestsLimit`.
//!
//! ```text
//! Closed ──[policy trips on failure]──> Open
//!   ▲                                     │ [open_interval elapsed, next admit]
//!   │                                     ▼
//!   └──[success_threshold, if set]─── HalfOpen ──[any failure]──> Open
//! ```
//!
//! ## Basic Usage
//!
//! ```rust
//! use fatol::{BreakerError, CircuitBreaker, DefaultPolicy};
//! use std::error::Error;
//! use std::fmt;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct ServiceError(String);
//!
//! impl fmt::Display for ServiceError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "Service error: {}", self.0)
//!     }
//! }
//!
//! impl Error for ServiceError {}
//!
//! let breaker = CircuitBreaker::<DefaultPolicy, ServiceError>::builder()
//!     .open_interval(Duration::from_secs(30))
//!     .max_requests(5)
//!     .build();
//!
//! match breaker.call(|| Ok::<_, ServiceError>("Success".to_string())) {
//!     Ok(result) => println!("Call succeeded: {}", result),
//!     Err(BreakerError::Open(e)) => println!("Circuit is open after {} requests", e.requests()),
//!     Err(BreakerError::RequestsLimit(e)) => println!("No trials left: {}", e),
//!     Err(BreakerError::Operation(err)) => println!("Call failed: {}", err),
//! }
//! ```
//!
//! ## Async Support
//!
//! With the `async` feature enabled:
//!
//! ```rust,ignore
//! let result = breaker.call_async(|| async {
//!     Ok::<_, ServiceError>("Success".to_string())
//! }).await;
//! ```
//!
//! ## Features
//!
//! - `async` - `call_async` for futures
//! - `prometheus` - [`PrometheusSink`] backed by `prometheus-client`
//! - `tracing` - log events through `tracing`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod clock;
mod config;
mod error;
mod hook;
mod log;
mod metrics;
mod policy;
pub mod prelude;
#[cfg(feature = "prometheus")]
mod prometheus;
mod state;

// Re-exports
pub use breaker::CircuitBreaker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreakerBuilder, DEFAULT_MAX_REQUESTS, DEFAULT_OPEN_INTERVAL};
pub use error::{
    BreakerError, BreakerResult, CompleteProcessError, OpenStateError, Rejection,
    RequestsLimitError,
};
pub use hook::HookRegistry;
pub use metrics::{Counts, MetricSink, NullMetricSink};
pub use policy::{BreakerPolicy, DefaultPolicy, FailureCountPolicy};
#[cfg(feature = "prometheus")]
#[cfg_attr(docsrs, doc(cfg(feature = "prometheus")))]
pub use prometheus::PrometheusSink;
pub use state::State;
