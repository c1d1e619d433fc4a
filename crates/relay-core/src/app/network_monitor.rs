//! NetworkMonitor - 接続状態の遷移をキューへ配信
//!
//! プラットフォーム（またはポーリング probe）が online/offline を報告し、
//! attach されたキューは `RequestQueue::set_online` で追従します。
//! offline になると drain は現在のエントリの後で止まり、online に戻ると再開します。
//!
//! # 学習ポイント
//! - tokio::sync::watch による最新値の配信
//! - interval + select! による停止可能なループ

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ports::ConnectivityProbe;
use crate::queue::RequestQueue;

use super::background::{BackgroundTask, shutdown_requested};

#[derive(Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    /// Report the current connectivity. Returns `true` on a transition.
    pub fn report(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
        changed
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Make `queue` follow this monitor. The queue is synced to the current
    /// state immediately; the returned task ends when every monitor clone
    /// is dropped.
    pub fn attach(&self, queue: RequestQueue) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        queue.set_online(*rx.borrow_and_update());

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                queue.set_online(online);
            }
            tracing::debug!("network monitor closed, detaching queue");
        })
    }

    /// Poll `probe` every `interval` and report what it says.
    pub fn spawn_probe(&self, probe: Arc<dyn ConnectivityProbe>, interval: Duration) -> BackgroundTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let monitor = self.clone();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown_rx) => break,
                    _ = ticker.tick() => {
                        let online = probe.is_online().await;
                        monitor.report(online);
                    }
                }
            }
            tracing::debug!("connectivity probe stopped");
        });

        BackgroundTask::new(shutdown_tx, join)
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
