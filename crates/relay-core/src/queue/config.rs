//! QueueConfig - the plain-data part of queue configuration.
//!
//! Everything here can be read from JSON; every field has a default.
//! Behaviour that cannot be data (token provider, callbacks, override
//! predicate, clock) is wired in through `RequestQueueBuilder`.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::RelayError;
use crate::impls::StoreConfig;
use crate::resilience::{
    BackoffConfig, BreakerConfig, DEFAULT_MAX_RETRIES, RetryClassifier, RetryPolicy,
    default_retryable_statuses,
};

/// How pending entries are ordered for draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Creation order only; `priority` is ignored.
    Fifo,
    /// Higher priority first, creation order among equals.
    #[default]
    Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_retries: u32,
    pub retryable_statuses: BTreeSet<u16>,
    /// Start draining right after enqueue (when online and not paused).
    pub auto_process: bool,
    pub ordering: OrderingMode,
    pub backoff: BackoffConfig,
    /// Build a circuit breaker for the queue's target. `None` disables it
    /// unless one is handed to the builder.
    pub breaker: Option<BreakerConfig>,
    pub store: StoreConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retryable_statuses: default_retryable_statuses(),
            auto_process: true,
            ordering: OrderingMode::default(),
            backoff: BackoffConfig::default(),
            breaker: None,
            store: StoreConfig::default(),
        }
    }
}

impl QueueConfig {
    pub fn from_json(json: &str) -> Result<Self, RelayError> {
        let config: QueueConfig = serde_json::from_str(json)
            .map_err(|e| RelayError::invalid_config(format!("malformed queue config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            RelayError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Reject settings that would make the queue misbehave.
    pub fn validate(&self) -> Result<(), RelayError> {
        let backoff = &self.backoff;
        if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
            return Err(RelayError::invalid_config(format!(
                "backoff.multiplier must be >= 1, got {}",
                backoff.multiplier
            )));
        }
        if backoff.max_delay < backoff.initial_delay {
            return Err(RelayError::invalid_config(format!(
                "backoff.max_delay ({:?}) is shorter than backoff.initial_delay ({:?})",
                backoff.max_delay, backoff.initial_delay
            )));
        }

        if let Some(breaker) = &self.breaker {
            if breaker.failure_threshold == 0 {
                return Err(RelayError::invalid_config(
                    "breaker.failure_threshold must be at least 1",
                ));
            }
            if breaker.success_threshold == 0 {
                return Err(RelayError::invalid_config(
                    "breaker.success_threshold must be at least 1",
                ));
            }
        }

        if let Some(code) = self.retryable_statuses.iter().find(|c| !(100..=599).contains(*c)) {
            return Err(RelayError::invalid_config(format!(
                "retryable_statuses contains {code}, which is not an HTTP status"
            )));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.backoff.clone(),
            RetryClassifier::new(self.retryable_statuses.clone()),
        )
    }
}
