//! Configuration for circuit breakers.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::policy::{BreakerPolicy, DefaultPolicy};

/// Default time an open circuit waits before admitting trial requests.
pub const DEFAULT_OPEN_INTERVAL: Duration = Duration::from_secs(60);

/// Default number of trial requests admitted per half-open window.
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Settings resolved by the builder and owned by the breaker.
pub(crate) struct BreakerSettings<P> {
    pub(crate) name: String,
    pub(crate) open_interval: Duration,
    pub(crate) max_requests: u32,
    pub(crate) counting_window: Option<Duration>,
    pub(crate) policy: P,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metric_sink: Arc<dyn MetricSink>,
    pub(crate) hooks: Arc<HookRegistry>,
}

/// Builder for creating circuit breakers with custom configurations.
///
/// ```rust
/// use fatol::{CircuitBreaker, DefaultPolicy};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::<DefaultPolicy, std::io::Error>::builder()
///     .name("inventory")
///     .open_interval(Duration::from_secs(10))
///     .max_requests(3)
///     .success_threshold(3)
///     .build();
/// assert_eq!(breaker.name(), "inventory");
/// ```
pub struct BreakerBuilder<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + 'static,
{
    name: String,
    open_interval: Duration,
    max_requests: u32,
    counting_window: Option<Duration>,
    policy: P,
    clock: Arc<dyn Clock>,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
    _error_type: PhantomData<E>,
}

impl<E> Default for BreakerBuilder<DefaultPolicy, E>
where
    E: std::error::Error + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> BreakerBuilder<DefaultPolicy, E>
where
    E: std::error::Error + 'static,
{
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: "default".to_string(),
            open_interval: DEFAULT_OPEN_INTERVAL,
            max_requests: DEFAULT_MAX_REQUESTS,
            counting_window: None,
            policy: DefaultPolicy::new(),
            clock: Arc::new(SystemClock),
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
            _error_type: PhantomData,
        }
    }

    /// Closes a half-open circuit after this many successful trials.
    ///
    /// Without it, a half-open circuit only leaves that state by failing, and
    /// one whose trials all succeed rejects every call once `max_requests`
    /// trials are spent. A threshold above `max_requests` is lowered to it.
    pub fn success_threshold(mut self, successes: u32) -> Self {
        self.policy = self.policy.with_success_threshold(successes);
        self
    }
}

impl<P, E> BreakerBuilder<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + 'static,
{
    /// Sets the name used in log events and metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets how long the circuit stays open before admitting trial requests.
    pub fn open_interval(mut self, interval: Duration) -> Self {
        self.open_interval = interval;
        self
    }

    /// Sets the number of trial requests admitted per half-open window.
    ///
    /// Zero is raised to one.
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests.max(1);
        self
    }

    /// Restarts the closed-state counters every `window`.
    pub fn counting_window(mut self, window: Duration) -> Self {
        self.counting_window = Some(window);
        self
    }

    /// Replaces the trip/close policy.
    pub fn policy<Q: BreakerPolicy>(self, policy: Q) -> BreakerBuilder<Q, E> {
        BreakerBuilder {
            name: self.name,
            open_interval: self.open_interval,
            max_requests: self.max_requests,
            counting_window: self.counting_window,
            policy,
            clock: self.clock,
            metric_sink: self.metric_sink,
            hook_registry: self.hook_registry,
            _error_type: PhantomData,
        }
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Shares a metric sink between several breakers.
    pub fn shared_metric_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.metric_sink = sink;
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Sets the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Changes the error type for the builder.
    pub fn with_error_type<NewE: std::error::Error + 'static>(self) -> BreakerBuilder<P, NewE> {
        BreakerBuilder {
            name: self.name,
            open_interval: self.open_interval,
            max_requests: self.max_requests,
            counting_window: self.counting_window,
            policy: self.policy,
            clock: self.clock,
            metric_sink: self.metric_sink,
            hook_registry: self.hook_registry,
            _error_type: PhantomData,
        }
    }

    /// Builds a new circuit breaker with the configured settings.
    pub fn build(self) -> CircuitBreaker<P, E> {
        CircuitBreaker::new(BreakerSettings {
            name: self.name,
            open_interval: self.open_interval,
            max_requests: self.max_requests,
            counting_window: self.counting_window,
            policy: self.policy.with_trial_budget(self.max_requests),
            clock: self.clock,
            metric_sink: self.metric_sink,
            hooks: self.hook_registry,
        })
    }
}
