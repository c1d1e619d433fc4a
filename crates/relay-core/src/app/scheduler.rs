//! DrainScheduler - backoff 中のエントリをリトライするホスト側タイマー
//!
//! `process()` は backoff を sleep しません。このループは `interval` ごと
//! （キューの時計で次のリトライがそれより早ければその時点）に起きて、
//! `process()` を呼び直します。

use std::time::Duration;

use tokio::sync::watch;

use crate::queue::RequestQueue;

use super::background::{BackgroundTask, shutdown_requested};

pub struct DrainScheduler;

impl DrainScheduler {
    pub fn spawn(queue: RequestQueue, interval: Duration) -> BackgroundTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            tracing::debug!(?interval, "drain scheduler started");
            loop {
                let wait = next_wake(&queue, interval);
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown_rx) => break,
                    _ = tokio::time::sleep(wait) => {
                        let summary = queue.process().await;
                        if summary.attempts() > 0 {
                            tracing::debug!(
                                succeeded = summary.succeeded,
                                retried = summary.retried,
                                dead_lettered = summary.dead_lettered,
                                "scheduled drain"
                            );
                        }
                    }
                }
            }
            tracing::debug!("drain scheduler stopped");
        });

        BackgroundTask::new(shutdown_tx, join)
    }
}

/// `interval`, or less when a retry becomes due sooner. An overdue retry
/// never shortens the wait to zero (a deferred entry would spin the loop).
fn next_wake(queue: &RequestQueue, interval: Duration) -> Duration {
    queue
        .time_until_next_retry()
        .filter(|until| !until.is_zero() && *until < interval)
        .unwrap_or(interval)
}
