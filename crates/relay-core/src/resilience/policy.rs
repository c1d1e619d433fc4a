//! RetryPolicy: turns a failed attempt into a `Decision`.
//!
//! Pure: given the entry's retry count and the error, return the next
//! action. Applying it (persisting, deleting, callbacks) is the queue's job.

use crate::domain::{Decision, DeliveryError};

use super::backoff::{self, BackoffConfig};
use super::classifier::RetryClassifier;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    pub backoff: BackoffConfig,
    pub classifier: RetryClassifier,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffConfig, classifier: RetryClassifier) -> Self {
        Self {
            max_retries,
            backoff,
            classifier,
        }
    }

    /// Decide what to do after attempt number `retries` (zero-based) failed.
    ///
    /// With `max_retries = 3` an always-transient failure is attempted four
    /// times: retries 0, 1, 2 are rescheduled, retry 3 is dead-lettered.
    pub fn decide(&self, retries: u32, error: &DeliveryError) -> Decision {
        if error.is_circuit_open() {
            return Decision::Defer;
        }

        if !self.classifier.is_retryable(error, retries) {
            return Decision::DeadLetter {
                reason: format!("terminal error: {error}"),
            };
        }

        if retries >= self.max_retries {
            return Decision::DeadLetter {
                reason: format!(
                    "retry budget exhausted after {} attempts: {error}",
                    retries + 1
                ),
            };
        }

        let delay = backoff::delay(retries, &self.backoff);
        Decision::Retry {
            delay,
            reason: format!(
                "retry {}/{} after {:?}: {error}",
                retries + 1,
                self.max_retries,
                delay
            ),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRIES,
            BackoffConfig::default(),
            RetryClassifier::default(),
        )
    }
}
