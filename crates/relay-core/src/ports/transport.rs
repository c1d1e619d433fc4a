//! Transport port - 呼び出し側が用意する executor（1 回の呼び出しを実行）

use async_trait::async_trait;

use crate::domain::{DeliveryError, DeliveryResponse, OutgoingRequest};

/// Performs the actual network call for one attempt.
///
/// Implementations map "no response" to `DeliveryError::Network`/`Timeout`
/// and non-success statuses to `DeliveryError::Status` so the classifier
/// can tell transient from terminal failures.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<DeliveryResponse, DeliveryError>;
}

/// Supplies a fresh credential at call time. The token is injected into the
/// outgoing request only and never stored.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, DeliveryError>;
}
