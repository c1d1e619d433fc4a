use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a background loop.
/// - `request_shutdown()` stops the loop at its next wake-up
/// - `shutdown_and_join()` also waits for it to finish
///
/// Dropping the handle also stops the loop (the shutdown channel closes).
pub struct BackgroundTask {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl BackgroundTask {
    pub(crate) fn new(shutdown_tx: watch::Sender<bool>, join: JoinHandle<()>) -> Self {
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "background task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Resolves when shutdown was requested or the handle was dropped.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
