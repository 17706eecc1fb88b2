use fatol::{
    BreakerError, CircuitBreaker, Counts, DefaultPolicy, FailureCountPolicy, HookRegistry,
    ManualClock, MetricSink, Rejection, State,
};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug)]
struct TestError(String);

impl TestError {
    fn new(msg: &str) -> Self {
        TestError(msg.to_string())
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Test error: {}", self.0)
    }
}

impl Error for TestError {}

fn ok() -> Result<String, TestError> {
    Ok("success".to_string())
}

fn fail() -> Result<String, TestError> {
    Err(TestError::new("error"))
}

fn breaker_with_clock() -> (CircuitBreaker<DefaultPolicy, TestError>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder()
        .open_interval(Duration::from_secs(60))
        .max_requests(5)
        .clock(clock.clone())
        .build();
    (breaker, clock)
}

fn half_open() -> (CircuitBreaker<DefaultPolicy, TestError>, Arc<ManualClock>) {
    let (breaker, clock) = breaker_with_clock();
    let _ = breaker.call(fail);
    clock.advance(Duration::from_secs(60));
    (breaker, clock)
}

#[test]
fn test_fresh_breaker() {
    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder().build();
    assert_eq!(breaker.current_state(), State::Closed);
    assert_eq!(breaker.counts(), Counts::default());
    assert_eq!(breaker.current_state().to_string(), "state is closed");
}

#[test]
fn test_successes_keep_circuit_closed() {
    let (breaker, _clock) = breaker_with_clock();

    for _ in 0..25 {
        assert_eq!(breaker.call(ok).unwrap(), "success");
    }

    assert_eq!(breaker.current_state(), State::Closed);
    assert_eq!(breaker.counts().successful_requests(), 25);
    assert_eq!(breaker.counts().requests(), 25);
    assert_eq!(breaker.counts().failed_requests(), 0);
}

#[test]
fn test_single_failure_trips() {
    let (breaker, _clock) = breaker_with_clock();

    let _ = breaker.call(ok);
    let result = breaker.call(fail);

    // The operation's error comes back untouched.
    match result {
        Err(BreakerError::Operation(e)) => assert_eq!(e.0, "error"),
        other => panic!("expected operation error, got {:?}", other),
    }
    assert_eq!(breaker.current_state(), State::Open);
    assert_eq!(breaker.counts().failed_requests(), 1);
}

#[test]
fn test_open_rejects_without_running_work() {
    let (breaker, _clock) = breaker_with_clock();
    let _ = breaker.call(fail);
    let before = breaker.counts().requests();

    let ran = AtomicUsize::new(0);
    for i in 1..=3 {
        let result = breaker.call(|| {
            ran.fetch_add(1, Ordering::SeqCst);
            ok()
        });
        match result {
            Err(BreakerError::Open(e)) => assert_eq!(e.requests(), before + i),
            other => panic!("expected open rejection, got {:?}", other),
        }
    }

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(breaker.counts().requests(), before + 3);
}

#[test]
fn test_open_becomes_half_open_after_interval() {
    let (breaker, clock) = breaker_with_clock();
    let _ = breaker.call(fail);

    clock.advance(Duration::from_secs(30));
    assert_eq!(breaker.current_state(), State::Open);

    clock.advance(Duration::from_secs(30));
    assert_eq!(breaker.current_state(), State::HalfOpen);
    assert_eq!(breaker.counts(), Counts::default());
    assert_eq!(breaker.time_in_state(), Duration::ZERO);
}

#[test]
fn test_half_open_trial_budget() {
    let (breaker, _clock) = half_open();

    let ran = AtomicUsize::new(0);
    for _ in 0..5 {
        let result = breaker.call(|| {
            ran.fetch_add(1, Ordering::SeqCst);
            ok()
        });
        assert!(result.is_ok());
    }
    assert_eq!(ran.load(Ordering::SeqCst), 5);

    let result = breaker.call(|| {
        ran.fetch_add(1, Ordering::SeqCst);
        ok()
    });
    match result {
        Err(BreakerError::RequestsLimit(e)) => {
            assert_eq!(e.requests(), 6);
            assert_eq!(e.max_requests(), 5);
        }
        other => panic!("expected requests limit, got {:?}", other),
    }
    assert_eq!(ran.load(Ordering::SeqCst), 5);

    // Without a success threshold the trials never close the circuit.
    assert_eq!(breaker.current_state(), State::HalfOpen);
}

#[test]
fn test_half_open_failure_reopens() {
    let (breaker, clock) = half_open();

    assert!(breaker.call(ok).is_ok());
    let result = breaker.call(fail);
    assert!(matches!(result, Err(BreakerError::Operation(_))));
    assert_eq!(breaker.current_state(), State::Open);

    // And the cooldown starts over.
    clock.advance(Duration::from_secs(59));
    assert!(matches!(breaker.call(ok), Err(BreakerError::Open(_))));
    clock.advance(Duration::from_secs(1));
    assert!(breaker.call(ok).is_ok());
}

#[test]
fn test_success_threshold_closes() {
    let clock = Arc::new(ManualClock::new());
    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder()
        .open_interval(Duration::from_secs(1))
        .max_requests(5)
        .success_threshold(3)
        .clock(clock.clone())
        .build();

    let _ = breaker.call(fail);
    clock.advance(Duration::from_secs(1));

    assert!(breaker.call(ok).is_ok());
    assert!(breaker.call(ok).is_ok());
    assert_eq!(breaker.current_state(), State::HalfOpen);
    assert!(breaker.call(ok).is_ok());
    assert_eq!(breaker.current_state(), State::Closed);
    assert_eq!(breaker.counts(), Counts::default());

    // Closed again, so the budget no longer applies.
    for _ in 0..10 {
        assert!(breaker.call(ok).is_ok());
    }
}

#[test]
fn test_success_threshold_above_trial_budget_still_closes() {
    let clock = Arc::new(ManualClock::new());
    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder()
        .open_interval(Duration::from_secs(1))
        .max_requests(2)
        .success_threshold(3)
        .clock(clock.clone())
        .build();

    let _ = breaker.call(fail);
    clock.advance(Duration::from_secs(1));

    assert!(breaker.call(ok).is_ok());
    assert!(breaker.call(ok).is_ok());
    assert_eq!(breaker.current_state(), State::Closed);

    for _ in 0..5 {
        assert!(breaker.call(ok).is_ok());
    }
}

#[test]
fn test_late_outcome_counts_in_current_window() {
    let clock = Arc::new(ManualClock::new());
    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder()
        .policy(FailureCountPolicy::new(2))
        .counting_window(Duration::from_secs(10))
        .clock(clock.clone())
        .build();

    let _ = breaker.call(fail);
    let _ = breaker.call(fail);
    clock.advance(Duration::from_secs(9));

    // Admitted in the first window, completes in the second.
    let result = breaker.call(|| {
        clock.advance(Duration::from_secs(5));
        fail()
    });
    assert!(matches!(result, Err(BreakerError::Operation(_))));

    assert_eq!(breaker.current_state(), State::Closed);
    assert_eq!(breaker.counts().failed_requests(), 1);
    assert_eq!(breaker.counts().requests(), 0);
}

#[test]
fn test_panicking_work_is_recorded_and_resumed() {
    let (breaker, _clock) = breaker_with_clock();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = breaker.call(|| -> Result<String, TestError> { panic!("downstream blew up") });
    }));

    let payload = caught.expect_err("panic must reach the caller");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"downstream blew up"));
    assert_eq!(breaker.counts().failed_requests(), 1);
    assert_eq!(breaker.current_state(), State::Open);
}

#[test]
fn test_manual_two_phase_protocol() {
    let (breaker, _clock) = breaker_with_clock();

    breaker.admit().expect("closed circuit admits");
    breaker.record_outcome(&ok());
    breaker.admit().expect("closed circuit admits");
    breaker.record_outcome(&fail());

    assert_eq!(breaker.current_state(), State::Open);
    assert!(matches!(breaker.admit(), Err(Rejection::Open(_))));

    let counts = breaker.counts();
    assert_eq!(counts.requests(), 3);
    assert_eq!(counts.successful_requests(), 1);
    assert_eq!(counts.failed_requests(), 1);
}

#[test]
fn test_circuit_breaker_manual_control() {
    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder().build();

    // Force open
    assert!(breaker.force_open());
    assert_eq!(breaker.current_state(), State::Open);

    // Check that calls are rejected when open
    let result = breaker.call(ok);
    assert!(matches!(result, Err(BreakerError::Open(_))));

    // Trying to open again should return false (no change)
    assert!(!breaker.force_open());

    // Force closed
    assert!(breaker.force_closed());
    assert_eq!(breaker.current_state(), State::Closed);
    assert!(breaker.call(ok).is_ok());

    // Trying to close again should return false (no change)
    assert!(!breaker.force_closed());
}

#[test]
fn test_concurrent_calls_are_all_counted() {
    const CALLERS: usize = 100;

    let breaker = Arc::new(CircuitBreaker::<DefaultPolicy, TestError>::builder().build());
    let barrier = Arc::new(Barrier::new(CALLERS));
    let mut handles = Vec::with_capacity(CALLERS);

    for _ in 0..CALLERS {
        let breaker = Arc::clone(&breaker);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            breaker.call(ok).is_ok()
        }));
    }

    let admitted = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|ok| *ok)
        .count();

    let counts = breaker.counts();
    assert_eq!(admitted, CALLERS);
    assert_eq!(counts.requests(), CALLERS as u32);
    assert_eq!(counts.successful_requests(), CALLERS as u32);
}

#[test]
fn test_concurrent_mixed_outcomes_stay_consistent() {
    const CALLERS: usize = 100;

    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder().build();
    let barrier = Arc::new(Barrier::new(CALLERS));
    let mut handles = Vec::with_capacity(CALLERS);

    for i in 0..CALLERS {
        let breaker = breaker.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let _ = breaker.call(|| if i % 10 == 0 { fail() } else { ok() });
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Some calls were rejected once the circuit opened, but every attempt
    // was counted and no admitted call went unrecorded.
    let counts = breaker.counts();
    assert_eq!(counts.requests(), CALLERS as u32);
    assert!(counts.successful_requests() + counts.failed_requests() <= CALLERS as u32);
    assert!(counts.failed_requests() >= 1);
    assert_eq!(breaker.current_state(), State::Open);
}

#[derive(Default)]
struct RecordingSink {
    transitions: Mutex<Vec<(String, State, State)>>,
    rejections: Mutex<Vec<&'static str>>,
    calls: Mutex<Vec<bool>>,
}

impl MetricSink for RecordingSink {
    fn record_state_transition(&self, breaker: &str, from: State, to: State) {
        self.transitions.lock().push((breaker.to_string(), from, to));
    }

    fn record_rejection(&self, _breaker: &str, rejection: &Rejection) {
        self.rejections.lock().push(rejection.as_label());
    }

    fn record_call(&self, _breaker: &str, success: bool, _duration: Duration) {
        self.calls.lock().push(success);
    }
}

#[test]
fn test_sink_and_hooks_observe_lifecycle() {
    let sink = Arc::new(RecordingSink::default());
    let hooks = HookRegistry::new();
    let opened = Arc::new(AtomicUsize::new(0));
    let half_opened = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&opened);
    hooks.on_open(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&half_opened);
    hooks.on_half_open(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&rejected);
    hooks.on_rejected(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let clock = Arc::new(ManualClock::new());
    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder()
        .name("orders")
        .open_interval(Duration::from_secs(5))
        .max_requests(1)
        .shared_metric_sink(sink.clone())
        .hooks(hooks)
        .clock(clock.clone())
        .build();

    let _ = breaker.call(ok);
    let _ = breaker.call(fail);
    let _ = breaker.call(ok); // rejected: open
    clock.advance(Duration::from_secs(5));
    let _ = breaker.call(ok); // trial
    let _ = breaker.call(ok); // rejected: budget

    assert_eq!(
        *sink.transitions.lock(),
        vec![
            ("orders".to_string(), State::Closed, State::Open),
            ("orders".to_string(), State::Open, State::HalfOpen),
        ]
    );
    assert_eq!(*sink.rejections.lock(), vec!["open", "requests_limit"]);
    assert_eq!(*sink.calls.lock(), vec![true, false, true]);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(half_opened.load(Ordering::SeqCst), 1);
    assert_eq!(rejected.load(Ordering::SeqCst), 2);
}

#[test]
fn test_real_clock_cooldown() {
    let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder()
        .open_interval(Duration::from_millis(100))
        .build();

    let _ = breaker.call(fail);
    assert_eq!(breaker.current_state(), State::Open);

    thread::sleep(Duration::from_millis(200));

    assert_eq!(breaker.current_state(), State::HalfOpen);
    assert!(breaker.call(ok).is_ok());
}

#[cfg(feature = "async")]
mod async_tests {
    use super::*;

    #[tokio::test]
    async fn test_async_circuit_breaker() {
        let (breaker, clock) = breaker_with_clock();

        for _ in 0..5 {
            let result = breaker.call_async(|| async { ok() }).await;
            assert!(result.is_ok());
        }

        let result = breaker.call_async(|| async { fail() }).await;
        assert!(matches!(result, Err(BreakerError::Operation(_))));
        assert_eq!(breaker.current_state(), State::Open);

        let result = breaker.call_async(|| async { ok() }).await;
        assert!(matches!(result, Err(BreakerError::Open(_))));

        clock.advance(Duration::from_secs(60));
        let result = breaker.call_async(|| async { ok() }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.current_state(), State::HalfOpen);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_async_concurrent_calls() {
        let breaker = CircuitBreaker::<DefaultPolicy, TestError>::builder().build();
        let mut tasks = Vec::new();

        for _ in 0..100 {
            let breaker = breaker.clone();
            tasks.push(tokio::spawn(async move {
                breaker
                    .call_async(|| async {
                        tokio::task::yield_now().await;
                        ok()
                    })
                    .await
                    .is_ok()
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(breaker.counts().requests(), 100);
        assert_eq!(breaker.counts().successful_requests(), 100);
    }

    #[test]
    fn test_async_panic_is_recorded() {
        let (breaker, _clock) = breaker_with_clock();

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            tokio_test::block_on(breaker.call_async(|| async {
                if true {
                    panic!("async downstream blew up");
                }
                ok()
            }))
        }));

        assert!(caught.is_err());
        assert_eq!(breaker.counts().failed_requests(), 1);
        assert_eq!(breaker.current_state(), State::Open);
    }
}
