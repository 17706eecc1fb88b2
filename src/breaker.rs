//! Core circuit breaker implementation.

use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::BreakerSettings;
use crate::error::{
    BreakerError, BreakerResult, CompleteProcessError, OpenStateError, Rejection,
    RequestsLimitError,
};
use crate::log::event;
use crate::metrics::Counts;
use crate::policy::{BreakerPolicy, DefaultPolicy};
use crate::state::{State, Transition};

/// Everything the lock guards.
#[derive(Debug)]
struct Core {
    state: State,
    counts: Counts,
    expiry: Option<Instant>,
    last_state_changed: Instant,
}

/// Inner state of the circuit breaker, shared between handles.
struct BreakerInner<P>
where
    P: BreakerPolicy,
{
    core: Mutex<Core>,
    settings: BreakerSettings<P>,
}

/// A circuit breaker that can wrap function calls to prevent cascading failures.
///
/// Cloning is cheap and yields another handle to the same breaker.
pub struct CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + 'static,
{
    inner: Arc<BreakerInner<P>>,
    _error_type: std::marker::PhantomData<fn() -> E>,
}

impl<P, E> CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + 'static,
{
    pub(crate) fn new(settings: BreakerSettings<P>) -> Self {
        let now = settings.clock.now();
        let core = Core {
            state: State::Closed,
            counts: Counts::default(),
            expiry: settings
                .counting_window
                .and_then(|window| now.checked_add(window)),
            last_state_changed: now,
        };

        Self {
            inner: Arc::new(BreakerInner {
                core: Mutex::new(core),
                settings,
            }),
            _error_type: std::marker::PhantomData,
        }
    }

    /// The name used in log events and metric labels.
    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    /// Gets the current state of the circuit breaker.
    pub fn current_state(&self) -> State {
        self.read(|core| core.state)
    }

    /// Gets a snapshot of the counters for the current window.
    pub fn counts(&self) -> Counts {
        self.read(|core| core.counts)
    }

    /// Gets the current error rate of the circuit breaker.
    pub fn error_rate(&self) -> f64 {
        self.counts().error_rate()
    }

    /// Gets the instant of the last state transition.
    pub fn last_state_changed(&self) -> Instant {
        self.read(|core| core.last_state_changed)
    }

    /// Duration since the last state transition.
    pub fn time_in_state(&self) -> Duration {
        let now = self.inner.settings.clock.now();
        now.saturating_duration_since(self.last_state_changed())
    }

    /// Executes a function wrapped by the circuit breaker.
    ///
    /// If `f` panics, the failure is recorded and the panic continues to
    /// unwind into the caller.
    pub fn call<F, T>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.admit()?;

        let start = Instant::now();
        let result = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => {
                self.record_abort(start.elapsed());
                panic::resume_unwind(payload);
            }
        };

        self.post_call(&result, start.elapsed());
        result.map_err(BreakerError::Operation)
    }

    /// Decides whether a request may proceed.
    ///
    /// Every attempt is counted, rejected ones included. Callers that use
    /// this directly instead of [`call`](Self::call) must follow an admitted
    /// request with exactly one [`record_outcome`](Self::record_outcome).
    pub fn admit(&self) -> Result<(), Rejection> {
        let settings = &self.inner.settings;
        let now = settings.clock.now();

        let (decision, transition) = {
            let mut core = self.inner.core.lock();
            let transition = self.refresh(&mut core, now);
            core.counts.on_request();
            let requests = core.counts.requests();

            let decision = match core.state {
                State::Closed => Ok(()),
                State::Open => Err(Rejection::Open(OpenStateError::new(requests))),
                State::HalfOpen if requests > settings.max_requests => Err(
                    Rejection::RequestsLimit(RequestsLimitError::new(
                        requests,
                        settings.max_requests,
                    )),
                ),
                State::HalfOpen => Ok(()),
            };
            (decision, transition)
        };

        self.notify(transition);
        if let Err(rejection) = &decision {
            event!(
                debug,
                breaker = %settings.name,
                reason = rejection.as_label(),
                requests = rejection.requests(),
                "request rejected"
            );
            settings.metric_sink.record_rejection(&settings.name, rejection);
            settings.hooks.execute_rejection_hook(rejection);
        }

        decision
    }

    /// Records the outcome of an admitted request.
    pub fn record_outcome<T, Err>(&self, result: &Result<T, Err>)
    where
        Err: Display,
    {
        match result {
            Ok(_) => self.record_success(),
            Err(err) => self.record_failure(err),
        }
    }

    /// Records a successful request.
    pub fn record_success(&self) {
        let settings = &self.inner.settings;
        let now = settings.clock.now();

        let (refreshed, transition) = {
            let mut core = self.inner.core.lock();
            let refreshed = self.refresh(&mut core, now);
            core.counts.on_success();
            let transition = if core.state == State::HalfOpen
                && settings.policy.should_close(&core.counts)
            {
                self.set_state(&mut core, State::Closed, now)
            } else {
                None
            };
            (refreshed, transition)
        };

        settings.hooks.execute_success_hook();
        self.notify(refreshed);
        self.notify(transition);
    }

    /// Records a failed request.
    pub fn record_failure<Err>(&self, error: &Err)
    where
        Err: Display + ?Sized,
    {
        let settings = &self.inner.settings;
        let now = settings.clock.now();

        let (refreshed, transition) = {
            let mut core = self.inner.core.lock();
            // A late outcome belongs to the window current at completion time.
            let refreshed = self.refresh(&mut core, now);
            core.counts.on_failure();
            let trip = match core.state {
                State::Closed => settings.policy.should_trip(&core.counts),
                State::HalfOpen => true,
                State::Open => false,
            };
            let transition = if trip {
                self.set_state(&mut core, State::Open, now)
            } else {
                None
            };
            (refreshed, transition)
        };

        event!(debug, breaker = %settings.name, error = %error, "request failed");
        #[cfg(not(feature = "tracing"))]
        let _ = error;

        settings.hooks.execute_failure_hook();
        self.notify(refreshed);
        self.notify(transition);
    }

    /// Forces the circuit breaker to the open state.
    pub fn force_open(&self) -> bool {
        self.force(State::Open)
    }

    /// Forces the circuit breaker to the closed state, resetting its counters.
    pub fn force_closed(&self) -> bool {
        self.force(State::Closed)
    }

    fn force(&self, to: State) -> bool {
        let now = self.inner.settings.clock.now();
        let transition = {
            let mut core = self.inner.core.lock();
            self.set_state(&mut core, to, now)
        };

        let changed = transition.is_some();
        self.notify(transition);
        changed
    }

    fn post_call<T>(&self, result: &Result<T, E>, duration: Duration) {
        let settings = &self.inner.settings;
        settings
            .metric_sink
            .record_call(&settings.name, result.is_ok(), duration);
        self.record_outcome(result);
    }

    fn record_abort(&self, duration: Duration) {
        let settings = &self.inner.settings;
        event!(warn, breaker = %settings.name, "protected call panicked");
        settings.metric_sink.record_call(&settings.name, false, duration);
        self.record_failure(&CompleteProcessError);
    }

    /// Runs `f` against the refreshed core.
    fn read<R>(&self, f: impl FnOnce(&Core) -> R) -> R {
        let now = self.inner.settings.clock.now();
        let (value, transition) = {
            let mut core = self.inner.core.lock();
            let transition = self.refresh(&mut core, now);
            (f(&*core), transition)
        };

        self.notify(transition);
        value
    }

    /// Re-derives the state from elapsed time. Must be called with the lock held.
    fn refresh(&self, core: &mut Core, now: Instant) -> Option<Transition> {
        let expired = core.expiry.is_some_and(|expiry| expiry <= now);
        if !expired {
            return None;
        }

        match core.state {
            State::Closed => {
                core.counts.reset();
                core.expiry = self
                    .inner
                    .settings
                    .counting_window
                    .and_then(|window| now.checked_add(window));
                event!(
                    debug,
                    breaker = %self.inner.settings.name,
                    "counting window restarted"
                );
                None
            }
            State::Open => self.set_state(core, State::HalfOpen, now),
            State::HalfOpen => None,
        }
    }

    /// Moves to `to`, scheduling the new state's expiry. Must be called with the lock held.
    fn set_state(&self, core: &mut Core, to: State, now: Instant) -> Option<Transition> {
        let from = core.state;
        if from == to {
            return None;
        }

        let settings = &self.inner.settings;
        core.state = to;
        core.last_state_changed = now;
        core.expiry = match to {
            // An interval too large to represent never expires.
            State::Open => now.checked_add(settings.open_interval),
            State::HalfOpen => None,
            State::Closed => settings
                .counting_window
                .and_then(|window| now.checked_add(window)),
        };
        // Entering Open keeps the counts that tripped it.
        if to != State::Open {
            core.counts.reset();
        }

        Some(Transition { from, to })
    }

    /// Reports a transition to logs, metrics and hooks. Must be called without the lock.
    fn notify(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };

        let settings = &self.inner.settings;
        event!(
            info,
            breaker = %settings.name,
            from = from.as_label(),
            to = to.as_label(),
            "circuit state changed"
        );
        settings
            .metric_sink
            .record_state_transition(&settings.name, from, to);
        settings.hooks.execute_state_transition_hook(to);
    }
}

impl<E> CircuitBreaker<DefaultPolicy, E>
where
    E: std::error::Error + 'static,
{
    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> crate::config::BreakerBuilder<DefaultPolicy, E> {
        crate::config::BreakerBuilder::new()
    }
}

impl<E> Default for CircuitBreaker<DefaultPolicy, E>
where
    E: std::error::Error + 'static,
{
    fn default() -> Self {
        Self::builder().build()
    }
}

// Allow cloning of circuit breakers - cheap because inner state is Arc'd
impl<P, E> Clone for CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _error_type: std::marker::PhantomData,
        }
    }
}

impl<P, E> std::fmt::Debug for CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (state, counts) = self.read(|core| (core.state, core.counts));
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.settings.name)
            .field("state", &state)
            .field("counts", &counts)
            .finish()
    }
}

// Implement Async support when the feature is enabled
#[cfg(feature = "async")]
impl<P, E> CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + 'static,
{
    /// Executes an async function wrapped by the circuit breaker.
    ///
    /// A panic while polling the future is recorded as a failure and resumed.
    pub async fn call_async<F, Fut, T>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        use futures::FutureExt;

        self.admit()?;

        let start = Instant::now();
        let result = match AssertUnwindSafe(f()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                self.record_abort(start.elapsed());
                panic::resume_unwind(payload);
            }
        };

        self.post_call(&result, start.elapsed());
        result.map_err(BreakerError::Operation)
    }
}
