//! Policy engine for circuit breaker trip and reset decisions.

use crate::metrics::Counts;

/// A policy that determines when to trip and reset a circuit breaker.
///
/// Both methods are called with the breaker's lock held and must not block.
pub trait BreakerPolicy: Send + Sync + 'static {
    /// Called in the closed state after a failure has been counted.
    fn should_trip(&self, counts: &Counts) -> bool;

    /// Called in the half-open state after a success has been counted.
    fn should_close(&self, counts: &Counts) -> bool;

    /// Fits the policy to a half-open window admitting `max_requests` trials.
    ///
    /// Called once when the breaker is built. A policy that closes on a number
    /// of successes must not ask for more than the window can deliver.
    fn with_trial_budget(self, max_requests: u32) -> Self
    where
        Self: Sized,
    {
        let _ = max_requests;
        self
    }
}

/// Trips on the first failure.
///
/// A half-open breaker only closes again when a success threshold is set.
/// Without one, a breaker whose trials all succeed stays half-open and, once
/// its `max_requests` trials are spent, rejects every further call with
/// `RequestsLimit` until a trial fails or it is forced closed. Set a
/// threshold unless that is what you want.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultPolicy {
    success_threshold: Option<u32>,
}

impl DefaultPolicy {
    /// Creates a new default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close a half-open circuit after `successes` successful trials.
    ///
    /// The breaker lowers the threshold to its `max_requests` when built.
    pub fn with_success_threshold(mut self, successes: u32) -> Self {
        self.success_threshold = Some(successes.max(1));
        self
    }

    /// The configured success threshold, if any.
    pub fn success_threshold(&self) -> Option<u32> {
        self.success_threshold
    }
}

impl BreakerPolicy for DefaultPolicy {
    fn should_trip(&self, _counts: &Counts) -> bool {
        true
    }

    fn should_close(&self, counts: &Counts) -> bool {
        reached(self.success_threshold, counts)
    }

    fn with_trial_budget(mut self, max_requests: u32) -> Self {
        self.success_threshold = capped(self.success_threshold, max_requests);
        self
    }
}

/// Trips once more than `max_failures` failures are counted in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCountPolicy {
    max_failures: u32,
    success_threshold: Option<u32>,
}

impl FailureCountPolicy {
    /// Creates a policy tolerating `max_failures` failures per window.
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            success_threshold: None,
        }
    }

    /// Close a half-open circuit after `successes` successful trials.
    ///
    /// The breaker lowers the threshold to its `max_requests` when built.
    pub fn with_success_threshold(mut self, successes: u32) -> Self {
        self.success_threshold = Some(successes.max(1));
        self
    }
}

impl BreakerPolicy for FailureCountPolicy {
    fn should_trip(&self, counts: &Counts) -> bool {
        counts.failed_requests() > self.max_failures
    }

    fn should_close(&self, counts: &Counts) -> bool {
        reached(self.success_threshold, counts)
    }

    fn with_trial_budget(mut self, max_requests: u32) -> Self {
        self.success_threshold = capped(self.success_threshold, max_requests);
        self
    }
}

fn capped(threshold: Option<u32>, max_requests: u32) -> Option<u32> {
    threshold.map(|n| n.min(max_requests.max(1)))
}

fn reached(threshold: Option<u32>, counts: &Counts) -> bool {
    threshold.is_some_and(|n| counts.successful_requests() >= n)
}
