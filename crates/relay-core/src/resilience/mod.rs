//! Failure handling shared by the queue and by direct callers.
//!
//! - `backoff`: delay before the next retry
//! - `classifier`: retryable vs. terminal errors
//! - `policy`: combines the two into a `Decision`
//! - `circuit_breaker`: fail fast while a target is down
//! - `retry`: in-process retry loop for calls outside the queue

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod policy;
pub mod retry;

pub use backoff::BackoffConfig;
pub use circuit_breaker::{BreakerConfig, BreakerError, BreakerStats, CircuitBreaker, CircuitState};
pub use classifier::{DEFAULT_RETRYABLE_STATUSES, RetryClassifier, RetryPredicate, default_retryable_statuses};
pub use policy::{DEFAULT_MAX_RETRIES, RetryPolicy};
pub use retry::{retry, retry_with_breaker};
