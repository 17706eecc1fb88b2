//! Advanced Circuit Breaker Example
//!
//! This example demonstrates:
//! 1. Logging breaker events through `tracing`
//! 2. Exporting call durations, transitions and rejections to Prometheus
//! 3. Using hooks for monitoring circuit breaker events
//! 4. Two breakers sharing one metrics sink

use fatol::{
    BreakerError, BreakerPolicy, CircuitBreaker, DefaultPolicy, FailureCountPolicy, HookRegistry,
    MetricSink, PrometheusSink,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// Succeeds three times, fails five times, then recovers.
fn external_service_call(calls: &mut u32) -> Result<String, ServiceError> {
    *calls += 1;
    match *calls {
        1..=3 => Ok("Initial success".to_string()),
        4..=8 => Err(ServiceError("Service temporarily unavailable".to_string())),
        _ => Ok("Stable success".to_string()),
    }
}

fn attempt<P: BreakerPolicy>(breaker: &CircuitBreaker<P, ServiceError>, calls: &mut u32) {
    match breaker.call(|| external_service_call(calls)) {
        Ok(response) => println!("[{}] response: {}", breaker.name(), response),
        Err(BreakerError::Operation(err)) => println!("[{}] {}", breaker.name(), err),
        Err(err) => println!("[{}] not attempted: {}", breaker.name(), err),
    }
    println!("[{}] {}", breaker.name(), breaker.current_state());
}

fn main() -> Result<(), fmt::Error> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    let mut registry = Registry::default();
    let sink: Arc<dyn MetricSink> = Arc::new(PrometheusSink::new(&mut registry));

    let hooks = HookRegistry::new();
    hooks.on_open(|| println!("Circuit OPENED"));
    hooks.on_close(|| println!("Circuit CLOSED after successful recovery"));
    hooks.on_half_open(|| println!("Circuit HALF-OPEN, testing if service recovered"));
    hooks.on_rejected(|rejection| println!("Rejected: {}", rejection));

    let strict = CircuitBreaker::<DefaultPolicy, ServiceError>::builder()
        .name("strict")
        .open_interval(Duration::from_secs(1))
        .max_requests(2)
        .success_threshold(2)
        .shared_metric_sink(Arc::clone(&sink))
        .hooks(hooks)
        .build();

    let tolerant = CircuitBreaker::<DefaultPolicy, ServiceError>::builder()
        .name("tolerant")
        .policy(FailureCountPolicy::new(3).with_success_threshold(2))
        .counting_window(Duration::from_secs(10))
        .open_interval(Duration::from_secs(1))
        .shared_metric_sink(Arc::clone(&sink))
        .build();

    let mut strict_calls = 0;
    let mut tolerant_calls = 0;

    for i in 1..=15 {
        println!("\n--- Call {} ---", i);

        attempt(&strict, &mut strict_calls);
        attempt(&tolerant, &mut tolerant_calls);

        thread::sleep(Duration::from_millis(300));
    }

    let mut out = String::new();
    encode(&mut out, &registry)?;
    println!("\n=== Metrics ===\n{}", out);

    Ok(())
}
