//! Error types for the circuit breaker library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Result type for circuit breaker operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// The circuit is open and the request was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenStateError {
    requests: u32,
}

impl OpenStateError {
    pub(crate) fn new(requests: u32) -> Self {
        Self { requests }
    }

    /// Number of requests counted in the current window, this one included.
    pub fn requests(&self) -> u32 {
        self.requests
    }
}

impl Display for OpenStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Circuit at the open state. Number of requests: {}",
            self.requests
        )
    }
}

impl Error for OpenStateError {}

/// The half-open trial budget for the current window is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestsLimitError {
    requests: u32,
    max_requests: u32,
}

impl RequestsLimitError {
    pub(crate) fn new(requests: u32, max_requests: u32) -> Self {
        Self {
            requests,
            max_requests,
        }
    }

    /// Number of requests counted in the current window, this one included.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// The trial budget that was exceeded.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

impl Display for RequestsLimitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Requests limit is reached: {}: current requests: {}",
            self.max_requests, self.requests
        )
    }
}

impl Error for RequestsLimitError {}

/// Recorded in place of an error when the protected operation panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompleteProcessError;

impl Display for CompleteProcessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "unable to complete process")
    }
}

impl Error for CompleteProcessError {}

/// Why [`admit`](crate::CircuitBreaker::admit) refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The circuit is open.
    Open(OpenStateError),

    /// The circuit is half-open and its trial budget is spent.
    RequestsLimit(RequestsLimitError),
}

impl Rejection {
    /// Number of requests counted in the current window when the rejection happened.
    pub fn requests(&self) -> u32 {
        match self {
            Rejection::Open(e) => e.requests(),
            Rejection::RequestsLimit(e) => e.requests(),
        }
    }

    /// Short label used for metric labels and log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            Rejection::Open(_) => "open",
            Rejection::RequestsLimit(_) => "requests_limit",
        }
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Open(e) => write!(f, "unable to process request at the open state: {}", e),
            Rejection::RequestsLimit(e) => {
                write!(f, "unable to process request with reaching limit: {}", e)
            }
        }
    }
}

impl Error for Rejection {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Rejection::Open(e) => Some(e),
            Rejection::RequestsLimit(e) => Some(e),
        }
    }
}

/// Error type for circuit breaker operations.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The circuit is open, calls are not permitted.
    Open(OpenStateError),

    /// The circuit is half-open and no trial requests are left in this window.
    RequestsLimit(RequestsLimitError),

    /// The underlying operation failed.
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Returns true when the breaker refused the call without running it.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, BreakerError::Operation(_))
    }

    /// Returns the operation's own error, if the call ran and failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the rejection, if the breaker refused the call.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            BreakerError::Open(e) => Some(Rejection::Open(*e)),
            BreakerError::RequestsLimit(e) => Some(Rejection::RequestsLimit(*e)),
            BreakerError::Operation(_) => None,
        }
    }
}

impl<E> From<Rejection> for BreakerError<E> {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Open(e) => BreakerError::Open(e),
            Rejection::RequestsLimit(e) => BreakerError::RequestsLimit(e),
        }
    }
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open(e) => {
                write!(f, "unable to process request at the open state: {}", e)
            }
            BreakerError::RequestsLimit(e) => {
                write!(f, "unable to process request with reaching limit: {}", e)
            }
            BreakerError::Operation(e) => write!(f, "Operation error: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Open(e) => Some(e),
            BreakerError::RequestsLimit(e) => Some(e),
            BreakerError::Operation(e) => Some(e),
        }
    }
}
