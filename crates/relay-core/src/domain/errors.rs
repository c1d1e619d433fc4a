//! Error types.
//!
//! - `DeliveryError`: one attempt failed. Absorbed by the queue during drain.
//! - `StoreError`: the backing store failed.
//! - `RelayError`: what caller-initiated queue operations return.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// No response was received (connection refused, DNS, reset, ...).
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// The remote answered with a non-success status.
    #[error("remote returned HTTP {code}")]
    Status { code: u16, body: Option<String> },

    /// The transport refused the request without contacting the remote.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The token provider could not produce a credential.
    #[error("credential unavailable: {0}")]
    Credentials(String),

    /// The circuit breaker blocked the call.
    #[error("circuit open")]
    CircuitOpen,
}

impl DeliveryError {
    pub fn network(message: impl Into<String>) -> Self {
        DeliveryError::Network(message.into())
    }

    pub fn status(code: u16) -> Self {
        DeliveryError::Status { code, body: None }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DeliveryError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, DeliveryError::CircuitOpen)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        RelayError::InvalidConfig(message.into())
    }
}
