//! Retryability classifier: transient (retry) or terminal (dead-letter)?

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::domain::DeliveryError;

/// Statuses retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

pub fn default_retryable_statuses() -> BTreeSet<u16> {
    DEFAULT_RETRYABLE_STATUSES.into_iter().collect()
}

/// Caller override: `(error, attempt) -> retry?`.
pub type RetryPredicate = Arc<dyn Fn(&DeliveryError, u32) -> bool + Send + Sync>;

/// Default policy:
/// - no response (network, timeout) -> retryable
/// - status in `retryable_statuses` -> retryable
/// - any other status -> terminal
/// - circuit open / credentials unavailable -> retryable (nothing reached the remote)
/// - rejected by the transport -> terminal
///
/// An override predicate, when set, replaces all of the above.
#[derive(Clone)]
pub struct RetryClassifier {
    retryable_statuses: BTreeSet<u16>,
    predicate: Option<RetryPredicate>,
}

impl RetryClassifier {
    pub fn new(retryable_statuses: BTreeSet<u16>) -> Self {
        Self {
            retryable_statuses,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn retryable_statuses(&self) -> &BTreeSet<u16> {
        &self.retryable_statuses
    }

    pub fn is_retryable(&self, error: &DeliveryError, attempt: u32) -> bool {
        if let Some(predicate) = &self.predicate {
            return predicate(error, attempt);
        }

        match error {
            DeliveryError::Network(_) | DeliveryError::Timeout => true,
            DeliveryError::Status { code, .. } => self.retryable_statuses.contains(code),
            DeliveryError::CircuitOpen | DeliveryError::Credentials(_) => true,
            DeliveryError::Rejected(_) => false,
        }
    }
}

impl Default for RetryClassifier {
    fn default() -> Self {
        Self::new(default_retryable_statuses())
    }
}

impl fmt::Debug for RetryClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryClassifier")
            .field("retryable_statuses", &self.retryable_statuses)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::request_timeout(408, true)]
    #[case::too_many_requests(429, true)]
    #[case::internal(500, true)]
    #[case::bad_gateway(502, true)]
    #[case::unavailable(503, true)]
    #[case::gateway_timeout(504, true)]
    #[case::bad_request(400, false)]
    #[case::unauthorized(401, false)]
    #[case::not_found(404, false)]
    #[case::conflict(409, false)]
    #[case::unprocessable(422, false)]
    #[case::not_implemented(501, false)]
    fn default_status_policy(#[case] code: u16, #[case] retryable: bool) {
        let classifier = RetryClassifier::default();
        assert_eq!(classifier.is_retryable(&DeliveryError::status(code), 0), retryable);
    }

    #[rstest]
    #[case::network(DeliveryError::network("connection reset"), true)]
    #[case::timeout(DeliveryError::Timeout, true)]
    #[case::circuit_open(DeliveryError::CircuitOpen, true)]
    #[case::credentials(DeliveryError::Credentials("expired".into()), true)]
    #[case::rejected(DeliveryError::Rejected("bad url".into()), false)]
    fn non_status_errors(#[case] error: DeliveryError, #[case] retryable: bool) {
        assert_eq!(RetryClassifier::default().is_retryable(&error, 0), retryable);
    }

    #[test]
    fn custom_status_set() {
        let classifier = RetryClassifier::new([409].into_iter().collect());
        assert!(classifier.is_retryable(&DeliveryError::status(409), 0));
        assert!(!classifier.is_retryable(&DeliveryError::status(503), 0));
    }

    #[test]
    fn predicate_overrides_everything() {
        let classifier = RetryClassifier::default()
            .with_predicate(Arc::new(|error: &DeliveryError, attempt: u32| {
                error.status_code() == Some(404) && attempt < 1
            }));

        assert!(classifier.is_retryable(&DeliveryError::status(404), 0));
        assert!(!classifier.is_retryable(&DeliveryError::status(404), 1));
        assert!(!classifier.is_retryable(&DeliveryError::network("down"), 0));
    }
}
