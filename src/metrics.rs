//! Window counters and the metrics sink interface.

use std::time::Duration;

use crate::error::Rejection;
use crate::state::State;

/// Trait for metrics sinks that can receive circuit breaker events.
///
/// Sinks are called after the breaker has released its lock, so an
/// implementation may block or take its own locks.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_state_transition(&self, breaker: &str, from: State, to: State);

    /// Records a call that was refused without running.
    fn record_rejection(&self, breaker: &str, rejection: &Rejection);

    /// Records a call result. Aborted calls are reported as failures.
    fn record_call(&self, breaker: &str, success: bool, duration: Duration);
}

/// A null metrics sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _breaker: &str, _from: State, _to: State) {}
    fn record_rejection(&self, _breaker: &str, _rejection: &Rejection) {}
    fn record_call(&self, _breaker: &str, _success: bool, _duration: Duration) {}
}

/// Request counters for the current window.
///
/// The breaker only mutates these while holding its lock, and always resets
/// all three together. Values handed out are snapshots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    requests: u32,
    successful: u32,
    failed: u32,
}

impl Counts {
    /// Number of admission attempts in the window, rejected ones included.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// Number of recorded successes in the window.
    pub fn successful_requests(&self) -> u32 {
        self.successful
    }

    /// Number of recorded failures in the window.
    pub fn failed_requests(&self) -> u32 {
        self.failed
    }

    /// Gets the failure ratio over recorded outcomes.
    pub fn error_rate(&self) -> f64 {
        let total = self.successful as u64 + self.failed as u64;
        if total == 0 {
            return 0.0;
        }

        self.failed as f64 / total as f64
    }

    pub(crate) fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    pub(crate) fn on_success(&mut self) {
        self.successful = self.successful.saturating_add(1);
    }

    pub(crate) fn on_failure(&mut self) {
        self.failed = self.failed.saturating_add(1);
    }

    pub(crate) fn reset(&mut self) {
        *self = Counts::default();
    }
}
