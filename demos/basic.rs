use fatol::{BreakerError, CircuitBreaker, DefaultPolicy};
use std::error::Error;
use std::fmt;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// Fails on the third call, succeeds otherwise.
fn call_service(counter: &mut u32) -> Result<String, ServiceError> {
    *counter += 1;
    if *counter == 3 {
        Err(ServiceError("External service error".to_string()))
    } else {
        Ok("Success".to_string())
    }
}

fn main() {
    let breaker = CircuitBreaker::<DefaultPolicy, ServiceError>::builder()
        .open_interval(Duration::from_secs(2))
        .max_requests(3)
        .success_threshold(2)
        .build();

    println!("Circuit initial state: {}", breaker.current_state());

    let mut counter = 0;

    for i in 1..=12 {
        print!("Attempt {}: ", i);

        match breaker.call(|| call_service(&mut counter)) {
            Ok(result) => println!("call succeeded with result: {}", result),
            Err(BreakerError::Open(e)) => println!("rejected, {}", e),
            Err(BreakerError::RequestsLimit(e)) => println!("rejected, {}", e),
            Err(BreakerError::Operation(err)) => println!("call failed with error: {}", err),
        }

        let counts = breaker.counts();
        println!(
            "  {}, requests={}, successes={}, failures={}",
            breaker.current_state(),
            counts.requests(),
            counts.successful_requests(),
            counts.failed_requests()
        );

        thread::sleep(Duration::from_millis(400));
    }
}
