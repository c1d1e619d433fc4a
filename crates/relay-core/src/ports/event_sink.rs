//! QueueEvents port - ライフサイクルのコールバック
//!
//! コールバックはキュー自身の記帳が終わった後に drain タスク上で呼ばれるので、
//! 常に一貫したキューを観測します。処理は短く保つこと。

use std::time::Duration;

use crate::domain::{DeliveryError, DeliveryResponse, QueueStatus, QueuedOperation};

pub trait QueueEvents: Send + Sync {
    /// The operation was delivered and removed.
    fn on_success(&self, _op: &QueuedOperation, _response: &DeliveryResponse) {}

    /// The operation was dead-lettered.
    fn on_failure(&self, _op: &QueuedOperation, _error: &DeliveryError) {}

    /// The operation failed transiently and will be retried after `delay`.
    fn on_retry(&self, _op: &QueuedOperation, _error: &DeliveryError, _delay: Duration) {}

    fn on_status_change(&self, _status: QueueStatus) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl QueueEvents for NoopEvents {}
