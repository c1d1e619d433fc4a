//! Standalone retry wrapper for one-off calls that do not go through the
//! durable queue. Same policy, same classification, but the waiting happens
//! in-process with `tokio::time::sleep`.

use std::future::Future;

use crate::domain::{Decision, DeliveryError};

use super::circuit_breaker::CircuitBreaker;
use super::policy::RetryPolicy;

/// Call `op` until it succeeds or `policy` gives up.
///
/// `op` receives the zero-based attempt number. The last error is returned
/// when the policy dead-letters or defers.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, DeliveryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DeliveryError>>,
{
    let mut attempt = 0;
    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match policy.decide(attempt, &err) {
            Decision::Retry { delay, reason } => {
                tracing::debug!(attempt, ?delay, %reason, "retrying call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Decision::DeadLetter { reason } => {
                tracing::warn!(attempt, %reason, "giving up on call");
                return Err(err);
            }
            Decision::Defer => return Err(err),
        }
    }
}

/// [`retry`] with every attempt routed through `breaker`.
///
/// Only errors the policy considers retryable count against the breaker.
/// An open circuit ends the loop with `DeliveryError::CircuitOpen`.
pub async fn retry_with_breaker<T, F, Fut>(
    policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    mut op: F,
) -> Result<T, DeliveryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DeliveryError>>,
{
    let classifier = &policy.classifier;
    retry(policy, |attempt| {
        let call = op(attempt);
        async move {
            breaker
                .execute_filtered(|| call, |e| classifier.is_retryable(e, attempt))
                .await
                .map_err(DeliveryError::from)
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{BackoffConfig, BreakerConfig, CircuitState, RetryClassifier};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            BackoffConfig {
                jitter: false,
                ..BackoffConfig::default()
            },
            RetryClassifier::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures_with_backoff() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = retry(&policy(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(DeliveryError::status(503))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DeliveryError::Timeout) }
        })
        .await;

        assert_eq!(result, Err(DeliveryError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DeliveryError::status(404)) }
        })
        .await;

        assert_eq!(result.unwrap_err().status_code(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn breaker_opens_and_stops_the_loop() {
        let breaker = CircuitBreaker::new(
            "upstream",
            BreakerConfig {
                failure_threshold: 2,
                ..BreakerConfig::default()
            },
        );
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_breaker(&policy(5), &breaker, |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::status(502))
        })
        .await;

        assert_eq!(result, Err(DeliveryError::CircuitOpen));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_do_not_count_against_breaker() {
        let breaker = CircuitBreaker::new(
            "upstream",
            BreakerConfig {
                failure_threshold: 1,
                ..BreakerConfig::default()
            },
        );

        let result: Result<(), _> = retry_with_breaker(&policy(3), &breaker, |_| async {
            Err(DeliveryError::status(422))
        })
        .await;

        assert_eq!(result.unwrap_err().status_code(), Some(422));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
