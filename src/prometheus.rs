//! Prometheus metrics via `prometheus-client`.

use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{linear_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::error::Rejection;
use crate::metrics::MetricSink;
use crate::state::State;

const NORM_MEAN: f64 = 0.00001;
const NORM_DOMAIN: f64 = 0.0002;
const BUCKET_COUNT: u16 = 20;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct CallLabels {
    breaker: String,
    outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct TransitionLabels {
    breaker: String,
    from: String,
    to: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RejectionLabels {
    breaker: String,
    reason: String,
}

fn duration_histogram() -> Histogram {
    Histogram::new(linear_buckets(
        NORM_MEAN - 5.0 * NORM_DOMAIN,
        0.5 * NORM_DOMAIN,
        BUCKET_COUNT,
    ))
}

/// A [`MetricSink`] that feeds a `prometheus-client` registry.
///
/// One sink can serve many breakers; every series is labelled with the
/// breaker's name.
///
/// ```rust
/// use fatol::{CircuitBreaker, DefaultPolicy, PrometheusSink};
/// use prometheus_client::registry::Registry;
///
/// let mut registry = Registry::default();
/// let breaker = CircuitBreaker::<DefaultPolicy, std::io::Error>::builder()
///     .name("billing")
///     .metric_sink(PrometheusSink::new(&mut registry))
///     .build();
/// # let _ = breaker;
/// ```
#[derive(Clone, Debug)]
pub struct PrometheusSink {
    durations: Family<CallLabels, Histogram, fn() -> Histogram>,
    transitions: Family<TransitionLabels, Counter>,
    rejections: Family<RejectionLabels, Counter>,
}

impl PrometheusSink {
    /// Creates the metric families and registers them with `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let durations =
            Family::<CallLabels, Histogram, fn() -> Histogram>::new_with_constructor(
                duration_histogram as fn() -> Histogram,
            );
        let transitions = Family::<TransitionLabels, Counter>::default();
        let rejections = Family::<RejectionLabels, Counter>::default();

        registry.register(
            "durations_seconds",
            "Duration of calls executed through a circuit breaker",
            durations.clone(),
        );
        registry.register(
            "state_transitions",
            "Circuit breaker state transitions",
            transitions.clone(),
        );
        registry.register(
            "rejections",
            "Calls refused by a circuit breaker without running",
            rejections.clone(),
        );

        Self {
            durations,
            transitions,
            rejections,
        }
    }
}

impl MetricSink for PrometheusSink {
    fn record_state_transition(&self, breaker: &str, from: State, to: State) {
        self.transitions
            .get_or_create(&TransitionLabels {
                breaker: breaker.to_string(),
                from: from.as_label().to_string(),
                to: to.as_label().to_string(),
            })
            .inc();
    }

    fn record_rejection(&self, breaker: &str, rejection: &Rejection) {
        self.rejections
            .get_or_create(&RejectionLabels {
                breaker: breaker.to_string(),
                reason: rejection.as_label().to_string(),
            })
            .inc();
    }

    fn record_call(&self, breaker: &str, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "failure" };
        self.durations
            .get_or_create(&CallLabels {
                breaker: breaker.to_string(),
                outcome: outcome.to_string(),
            })
            .observe(duration.as_secs_f64());
    }
}
