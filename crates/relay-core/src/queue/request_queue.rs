//! RequestQueue - durable, prioritized delivery of state-mutating calls.
//!
//! # Locking
//! - `state` (std mutex): pending set, flags and counters. Never held
//!   across an await, so observers are plain synchronous getters.
//! - `store_lock` (tokio mutex): serializes "write store, then update
//!   memory" so the two never disagree about which entries exist.
//!
//! # Draining
//! Only one drain runs at a time: `process()` checks and sets the
//! `draining` flag under the state lock and returns immediately when it is
//! already set. The drain re-reads the pending set before every entry, so
//! entries enqueued mid-drain are picked up in priority order. Backoff is
//! never slept here; a rescheduled entry carries `not_before` and is skipped
//! until it is due.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{
    Decision, DeliveryError, DeliveryResponse, DrainSummary, NewOperation, OperationId,
    QueueStats, QueueStatus, QueuedOperation, RelayError,
};
use crate::ports::{Clock, IdGenerator, OperationStore, QueueEvents, TokenProvider, Transport};
use crate::resilience::{CircuitBreaker, RetryPolicy};

use super::pending::PendingSet;

/// Everything the builder resolved.
pub(super) struct Parts {
    pub store: Arc<dyn OperationStore>,
    pub transport: Arc<dyn Transport>,
    pub token_provider: Option<Arc<dyn TokenProvider>>,
    pub events: Arc<dyn QueueEvents>,
    pub breaker: Option<Arc<CircuitBreaker>>,
    pub policy: RetryPolicy,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub auto_process: bool,
    pub pending: PendingSet,
    pub online: bool,
}

struct QueueState {
    pending: PendingSet,
    in_flight: Option<OperationId>,
    online: bool,
    paused: bool,
    draining: bool,
    status: QueueStatus,
    completed: u64,
    failed: u64,
}

impl QueueState {
    /// Recompute the status. Returns the new one if it changed.
    fn refresh_status(&mut self) -> Option<QueueStatus> {
        let next = QueueStatus::derive(self.online, self.paused, self.draining);
        if next == self.status {
            return None;
        }
        self.status = next;
        Some(next)
    }

    fn should_stop(&self) -> bool {
        !self.online || self.paused
    }
}

struct Inner {
    store: Arc<dyn OperationStore>,
    transport: Arc<dyn Transport>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    events: Arc<dyn QueueEvents>,
    breaker: Option<Arc<CircuitBreaker>>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    auto_process: bool,
    state: Mutex<QueueState>,
    store_lock: tokio::sync::Mutex<()>,
}

/// Handle to a queue. Clones share the same queue.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<Inner>,
}

impl RequestQueue {
    pub(super) fn from_parts(parts: Parts) -> Self {
        let status = QueueStatus::derive(parts.online, false, false);
        Self {
            inner: Arc::new(Inner {
                store: parts.store,
                transport: parts.transport,
                token_provider: parts.token_provider,
                events: parts.events,
                breaker: parts.breaker,
                policy: parts.policy,
                clock: parts.clock,
                ids: parts.ids,
                auto_process: parts.auto_process,
                state: Mutex::new(QueueState {
                    pending: parts.pending,
                    in_flight: None,
                    online: parts.online,
                    paused: false,
                    draining: false,
                    status,
                    completed: 0,
                    failed: 0,
                }),
                store_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit_status(&self, change: Option<QueueStatus>) {
        if let Some(status) = change {
            tracing::debug!(%status, "queue status changed");
            self.inner.events.on_status_change(status);
        }
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Persist a new operation and return its id.
    ///
    /// Credential headers are stripped before anything is written. The call
    /// returns only after the record is durable. With `auto_process` on, a
    /// drain is started in the background when the queue is online and not
    /// paused.
    pub async fn enqueue(&self, op: NewOperation) -> Result<OperationId, RelayError> {
        let id = self.inner.ids.generate();
        let record = QueuedOperation::from_new(id, self.inner.clock.now(), op);

        {
            let _guard = self.inner.store_lock.lock().await;
            self.inner.store.put(&record).await?;
            tracing::debug!(op_id = %id, method = %record.method, target = %record.target, "enqueued");
            self.lock_state().pending.insert(record);
        }

        let should_drain = {
            let state = self.lock_state();
            self.inner.auto_process && !state.should_stop()
        };
        if should_drain {
            self.spawn_drain();
        }

        Ok(id)
    }

    /// Remove a pending operation. Returns `false` if it is not queued.
    pub async fn dequeue(&self, id: OperationId) -> Result<bool, RelayError> {
        let _guard = self.inner.store_lock.lock().await;
        if !self.lock_state().pending.contains(id) {
            return Ok(false);
        }

        self.inner.store.delete(id).await?;
        let removed = self.lock_state().pending.remove(id).is_some();
        tracing::debug!(op_id = %id, "dequeued");
        Ok(removed)
    }

    /// Drop every pending operation, in the store and in memory.
    ///
    /// A call already in flight is not cancelled; its outcome is ignored
    /// unless it succeeds.
    pub async fn clear(&self) -> Result<(), RelayError> {
        let _guard = self.inner.store_lock.lock().await;
        self.inner.store.clear().await?;

        let dropped = {
            let mut state = self.lock_state();
            let n = state.pending.len();
            state.pending.clear();
            n
        };
        tracing::info!(dropped, "queue cleared");
        Ok(())
    }

    pub fn pause(&self) {
        let change = {
            let mut state = self.lock_state();
            state.paused = true;
            state.refresh_status()
        };
        tracing::info!("queue paused");
        self.emit_status(change);
    }

    /// Lift a pause and drain right away.
    pub async fn resume(&self) -> DrainSummary {
        let change = {
            let mut state = self.lock_state();
            state.paused = false;
            state.refresh_status()
        };
        tracing::info!("queue resumed");
        self.emit_status(change);
        self.process().await
    }

    /// Connectivity transition. Going online starts a background drain
    /// when `auto_process` is on and the queue is not paused.
    pub fn set_online(&self, online: bool) {
        let (change, should_drain) = {
            let mut state = self.lock_state();
            if state.online == online {
                return;
            }
            state.online = online;
            let change = state.refresh_status();
            (change, online && self.inner.auto_process && !state.paused)
        };

        if online {
            tracing::info!("connectivity restored");
        } else {
            tracing::warn!("connectivity lost");
        }
        self.emit_status(change);

        if should_drain {
            self.spawn_drain();
        }
    }

    fn spawn_drain(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                handle.spawn(async move {
                    queue.process().await;
                });
            }
            Err(_) => tracing::debug!("no runtime available, drain deferred to next process()"),
        }
    }

    // ---------------------------------------------------------------
    // Draining
    // ---------------------------------------------------------------

    /// Drain due entries in priority order.
    ///
    /// A no-op while another drain is running or the queue is paused or
    /// offline. Never fails: delivery errors are absorbed by the retry
    /// policy and storage errors during the drain are logged.
    pub async fn process(&self) -> DrainSummary {
        let mut summary = DrainSummary::default();

        let change = {
            let mut state = self.lock_state();
            if state.draining || state.should_stop() {
                return summary;
            }
            state.draining = true;
            state.refresh_status()
        };
        self.emit_status(change);
        tracing::debug!(pending = self.pending_count(), "drain started");

        let mut attempted: HashSet<OperationId> = HashSet::new();
        let mut circuit_open = false;

        loop {
            let next = {
                let mut state = self.lock_state();
                let next = if circuit_open || state.should_stop() {
                    None
                } else {
                    let now = self.inner.clock.now();
                    let mut candidate = state.pending.next_due(now, &attempted).cloned();
                    if candidate.is_none() && !attempted.is_empty() {
                        // Pass finished; start another if anything became due.
                        attempted.clear();
                        candidate = state.pending.next_due(now, &attempted).cloned();
                    }
                    candidate
                };

                match next {
                    Some(op) => {
                        state.in_flight = Some(op.id);
                        Some(op)
                    }
                    None => {
                        state.draining = false;
                        let change = state.refresh_status();
                        drop(state);
                        self.emit_status(change);
                        None
                    }
                }
            };

            let Some(op) = next else {
                break;
            };
            attempted.insert(op.id);

            match self.attempt(&op).await {
                Ok(response) => {
                    self.complete(&op, &response).await;
                    summary.succeeded += 1;
                }
                Err(error) => match self.inner.policy.decide(op.retries, &error) {
                    Decision::Defer => {
                        self.lock_state().in_flight = None;
                        tracing::info!(op_id = %op.id, "circuit open, deferring remaining entries");
                        summary.deferred += 1;
                        circuit_open = true;
                    }
                    Decision::DeadLetter { reason } => {
                        self.dead_letter(&op, &error, &reason).await;
                        summary.dead_lettered += 1;
                    }
                    Decision::Retry { delay, reason } => {
                        self.reschedule(&op, &error, delay, &reason).await;
                        summary.retried += 1;
                    }
                },
            }
        }

        tracing::debug!(
            succeeded = summary.succeeded,
            dead_lettered = summary.dead_lettered,
            retried = summary.retried,
            deferred = summary.deferred,
            "drain finished"
        );
        summary
    }

    /// One delivery attempt: credential injection, breaker gate, transport.
    ///
    /// The breaker wraps only the transport call. A failing token provider
    /// is a different remote and never counts against the target's breaker.
    async fn attempt(&self, op: &QueuedOperation) -> Result<DeliveryResponse, DeliveryError> {
        let inner = &self.inner;
        let mut request = op.to_request();
        if let Some(provider) = &inner.token_provider {
            let token = provider.token().await.map_err(|e| match e {
                DeliveryError::Credentials(_) => e,
                other => DeliveryError::Credentials(other.to_string()),
            })?;
            request = request.with_bearer(&token);
        }

        let call = || async move {
            tracing::debug!(op_id = %op.id, attempt = op.retries, "sending");
            inner.transport.send(request).await
        };

        match &inner.breaker {
            Some(breaker) => breaker
                .execute_filtered(call, |e| inner.policy.classifier.is_retryable(e, op.retries))
                .await
                .map_err(DeliveryError::from),
            None => call().await,
        }
    }

    async fn complete(&self, op: &QueuedOperation, response: &DeliveryResponse) {
        {
            let _guard = self.inner.store_lock.lock().await;
            if let Err(e) = self.inner.store.delete(op.id).await {
                // The entry may be delivered again after a restart.
                tracing::error!(op_id = %op.id, error = %e, "failed to delete delivered operation");
            }

            let mut state = self.lock_state();
            state.pending.remove(op.id);
            state.in_flight = None;
            state.completed += 1;
        }

        tracing::debug!(op_id = %op.id, status = response.status, "delivered");
        self.inner.events.on_success(op, response);
    }

    async fn dead_letter(&self, op: &QueuedOperation, error: &DeliveryError, reason: &str) {
        {
            let _guard = self.inner.store_lock.lock().await;
            if !self.lock_state().pending.contains(op.id) {
                self.lock_state().in_flight = None;
                return;
            }

            if let Err(e) = self.inner.store.delete(op.id).await {
                tracing::error!(op_id = %op.id, error = %e, "failed to delete dead-lettered operation");
            }

            let mut state = self.lock_state();
            state.pending.remove(op.id);
            state.in_flight = None;
            state.failed += 1;
        }

        tracing::warn!(op_id = %op.id, retries = op.retries, %reason, "dead-lettered");
        self.inner.events.on_failure(op, error);
    }

    async fn reschedule(&self, op: &QueuedOperation, error: &DeliveryError, delay: Duration, reason: &str) {
        let mut updated = op.clone();
        updated.retries += 1;
        updated.not_before = Some(after(self.inner.clock.now(), delay));
        updated.last_error = Some(error.to_string());

        {
            let _guard = self.inner.store_lock.lock().await;
            if !self.lock_state().pending.contains(op.id) {
                self.lock_state().in_flight = None;
                return;
            }

            if let Err(e) = self.inner.store.put(&updated).await {
                tracing::error!(op_id = %op.id, error = %e, "failed to persist retry state");
            }

            let mut state = self.lock_state();
            state.pending.insert(updated.clone());
            state.in_flight = None;
        }

        tracing::warn!(op_id = %op.id, retries = updated.retries, %reason, "scheduled retry");
        self.inner.events.on_retry(&updated, error, delay);
    }

    // ---------------------------------------------------------------
    // Observers
    // ---------------------------------------------------------------

    /// Entries not yet delivered or dead-lettered (including one in flight).
    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().pending.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock_state();
        QueueStats {
            pending: state.pending.len(),
            processing: usize::from(state.in_flight.is_some()),
            completed: state.completed,
            failed: state.failed,
        }
    }

    pub fn status(&self) -> QueueStatus {
        self.lock_state().status
    }

    pub fn is_online(&self) -> bool {
        self.lock_state().online
    }

    pub fn is_paused(&self) -> bool {
        self.lock_state().paused
    }

    /// Snapshot of pending entries in drain order.
    pub fn pending(&self) -> Vec<QueuedOperation> {
        self.lock_state().pending.iter().cloned().collect()
    }

    pub fn get(&self, id: OperationId) -> Option<QueuedOperation> {
        self.lock_state().pending.get(id).cloned()
    }

    /// Earliest instant a backed-off entry becomes due.
    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.lock_state().pending.earliest_not_before()
    }

    /// How long until `next_retry_at`, measured on the queue's clock.
    /// `Some(Duration::ZERO)` when a retry is already overdue.
    pub fn time_until_next_retry(&self) -> Option<Duration> {
        let at = self.next_retry_at()?;
        Some((at - self.inner.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.inner.breaker.as_ref()
    }
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
