//! FnTransport - adapts an async closure into a `Transport`.

use std::future::Future;

use async_trait::async_trait;

use crate::domain::{DeliveryError, DeliveryResponse, OutgoingRequest};
use crate::ports::Transport;

/// ```ignore
/// let transport = FnTransport::new(|request: OutgoingRequest| async move {
///     client.send(request).await
/// });
/// ```
pub struct FnTransport<F> {
    f: F,
}

impl<F> FnTransport<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(OutgoingRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<DeliveryResponse, DeliveryError>> + Send,
{
    async fn send(&self, request: OutgoingRequest) -> Result<DeliveryResponse, DeliveryError> {
        (self.f)(request).await
    }
}
