//! Circuit breaker guarding one logical remote target.
//!
//! # States
//! - Closed: calls pass through; consecutive failures are counted
//! - Open: calls fail fast with `BreakerError::Open`
//! - HalfOpen: a single trial call decides between Closed and Open
//!
//! # Transitions
//! ```text
//! Closed   -> Open:     failure_threshold consecutive failures
//! Open     -> HalfOpen: next call after reset_timeout (the call becomes the trial)
//! HalfOpen -> Closed:   success_threshold trial successes
//! HalfOpen -> Open:     any trial failure (timer restarts)
//! ```
//!
//! The lock is never held across the wrapped call.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DeliveryError;
use crate::ports::{Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    #[serde(rename = "reset_timeout_ms", with = "crate::duration_ms")]
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        })
    }
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit open")]
    Open,

    #[error(transparent)]
    Inner(E),
}

impl From<BreakerError<DeliveryError>> for DeliveryError {
    fn from(err: BreakerError<DeliveryError>) -> Self {
        match err {
            BreakerError::Open => DeliveryError::CircuitOpen,
            BreakerError::Inner(e) => e,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    pub rejected: u64,
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    rejected: u64,
    opened_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn initial() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            rejected: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerState::initial()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.lock();
        BreakerStats {
            state: inner.state,
            consecutive_failures: inner.failures,
            half_open_successes: inner.successes,
            rejected: inner.rejected,
            opened_at: inner.opened_at,
        }
    }

    /// Run `f` through the breaker. Every error counts as a failure.
    pub async fn execute<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_filtered(f, |_| true).await
    }

    /// Run `f` through the breaker. Errors for which `is_failure` returns
    /// false prove the target is reachable and count as successes.
    pub async fn execute_filtered<T, E, F, Fut, P>(
        &self,
        f: F,
        is_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut admission = self.admit().ok_or(BreakerError::Open)?;

        let result = f().await;
        match &result {
            Err(e) if is_failure(e) => admission.failure(),
            _ => admission.success(),
        }
        result.map_err(BreakerError::Inner)
    }

    /// Force the circuit open (operational override).
    pub fn open(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        Self::trip(&self.name, &mut inner, now);
    }

    /// Force the circuit closed and forget the failure streak.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.successes = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
        tracing::info!(breaker = %self.name, "circuit manually closed");
    }

    /// Back to the initial state, including statistics.
    pub fn reset(&self) {
        *self.lock() = BreakerState::initial();
        tracing::info!(breaker = %self.name, "circuit reset");
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn admit(&self) -> Option<Admission<'_>> {
        let now = self.clock.now();
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Some(Admission::new(self, false)),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .and_then(|at| (now - at).to_std().ok())
                    .unwrap_or_default();

                if elapsed >= self.config.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.successes = 0;
                    inner.trial_in_flight = true;
                    tracing::info!(breaker = %self.name, "circuit half-open, admitting trial call");
                    Some(Admission::new(self, true))
                } else {
                    inner.rejected += 1;
                    None
                }
            }
            CircuitState::HalfOpen if inner.trial_in_flight => {
                inner.rejected += 1;
                None
            }
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                Some(Admission::new(self, true))
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => inner.failures = 0,
            CircuitState::HalfOpen => {
                inner.trial_in_flight = false;
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.opened_at = None;
                    tracing::info!(breaker = %self.name, "circuit closed");
                }
            }
            // A call admitted before the circuit opened finished late.
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    Self::trip(&self.name, &mut inner, now);
                }
            }
            CircuitState::HalfOpen => {
                inner.failures += 1;
                Self::trip(&self.name, &mut inner, now);
            }
            CircuitState::Open => {}
        }
    }

    fn release_trial(&self) {
        self.lock().trial_in_flight = false;
    }

    fn trip(name: &str, inner: &mut BreakerState, now: DateTime<Utc>) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.successes = 0;
        inner.trial_in_flight = false;
        tracing::warn!(breaker = %name, failures = inner.failures, "circuit opened");
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// A call let through the breaker. If the wrapped future is dropped before
/// an outcome is recorded, the trial slot is released.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Admission<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    fn success(&mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn failure(&mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn breaker(failure_threshold: u32, success_threshold: u32) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = BreakerConfig {
            failure_threshold,
            success_threshold,
            reset_timeout: Duration::from_secs(10),
        };
        (CircuitBreaker::with_clock("test", config, clock.clone()), clock)
    }

    async fn fail(b: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        b.execute(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(b: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        b.execute(|| async { Ok::<(), &'static str>(()) }).await
    }

    #[tokio::test]
    async fn opens_after_threshold_and_rejects_without_calling() {
        let (b, _clock) = breaker(3, 1);
        for _ in 0..3 {
            assert!(matches!(fail(&b).await, Err(BreakerError::Inner("boom"))));
        }
        assert_eq!(b.state(), CircuitState::Open);

        let calls = AtomicUsize::new(0);
        let result = b
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), &'static str>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(b.stats().rejected, 1);
    }

    #[tokio::test]
    async fn success_resets_the_failure_streak() {
        let (b, _clock) = breaker(3, 1);
        fail(&b).await.unwrap_err();
        fail(&b).await.unwrap_err();
        succeed(&b).await.unwrap();
        fail(&b).await.unwrap_err();
        fail(&b).await.unwrap_err();

        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.stats().consecutive_failures, 2);
    }

    #[tokio::test]
    async fn half_open_trial_success_closes() {
        let (b, clock) = breaker(3, 1);
        for _ in 0..3 {
            fail(&b).await.unwrap_err();
        }

        clock.advance(Duration::from_secs(9));
        assert!(matches!(succeed(&b).await, Err(BreakerError::Open)));

        clock.advance(Duration::from_secs(1));
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.stats().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn half_open_trial_failure_reopens_and_restarts_timer() {
        let (b, clock) = breaker(1, 1);
        fail(&b).await.unwrap_err();
        clock.advance(Duration::from_secs(10));

        assert!(matches!(fail(&b).await, Err(BreakerError::Inner(_))));
        assert_eq!(b.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(5));
        assert!(matches!(succeed(&b).await, Err(BreakerError::Open)));

        clock.advance(Duration::from_secs(5));
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn success_threshold_requires_several_trials() {
        let (b, clock) = breaker(1, 2);
        fail(&b).await.unwrap_err();
        clock.advance(Duration::from_secs(10));

        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn only_one_trial_at_a_time() {
        let (b, clock) = breaker(1, 1);
        let b = Arc::new(b);
        fail(&b).await.unwrap_err();
        clock.advance(Duration::from_secs(10));

        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let trial = tokio::spawn({
            let b = Arc::clone(&b);
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            async move {
                b.execute(|| async move {
                    started.notify_one();
                    release.notified().await;
                    Ok::<(), &'static str>(())
                })
                .await
            }
        });

        started.notified().await;
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(matches!(succeed(&b).await, Err(BreakerError::Open)));

        release.notify_one();
        trial.await.unwrap().unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn dropped_trial_releases_the_slot() {
        let (b, clock) = breaker(1, 1);
        fail(&b).await.unwrap_err();
        clock.advance(Duration::from_secs(10));

        let pending = b.execute(|| std::future::pending::<Result<(), &'static str>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn filtered_errors_do_not_trip() {
        let (b, _clock) = breaker(1, 1);
        let result = b
            .execute_filtered(|| async { Err::<(), u16>(404) }, |code| *code >= 500)
            .await;

        assert!(matches!(result, Err(BreakerError::Inner(404))));
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn manual_overrides() {
        let (b, _clock) = breaker(3, 1);

        b.open();
        assert_eq!(b.state(), CircuitState::Open);
        assert!(matches!(succeed(&b).await, Err(BreakerError::Open)));

        b.close();
        assert_eq!(b.state(), CircuitState::Closed);
        succeed(&b).await.unwrap();

        b.open();
        succeed(&b).await.unwrap_err();
        b.reset();
        assert_eq!(
            b.stats(),
            BreakerStats {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                rejected: 0,
                opened_at: None,
            }
        );
    }

    #[test]
    fn breaker_error_maps_to_delivery_error() {
        assert_eq!(
            DeliveryError::from(BreakerError::Open),
            DeliveryError::CircuitOpen
        );
        assert_eq!(
            DeliveryError::from(BreakerError::Inner(DeliveryError::Timeout)),
            DeliveryError::Timeout
        );
    }
}
