use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

use relay_core::domain::{DeliveryError, DeliveryResponse, NewOperation, OutgoingRequest, QueueStatus, QueuedOperation};
use relay_core::impls::StoreConfig;
use relay_core::ports::{QueueEvents, TokenProvider, Transport};
use relay_core::queue::{QueueConfig, RequestQueueBuilder};
use relay_core::resilience::{BackoffConfig, BreakerConfig};
use relay_core::{DrainScheduler, NetworkMonitor};

#[derive(Debug, Deserialize)]
struct OrderPayload {
    sku: String,
    qty: u32,
}

/// Pretend order API: answers 503 a few times, 404 for unknown orders.
struct FlakyOrderApi {
    remaining_failures: AtomicU32,
}

impl FlakyOrderApi {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Transport for FlakyOrderApi {
    async fn send(&self, request: OutgoingRequest) -> Result<DeliveryResponse, DeliveryError> {
        if request.target.ends_with("/missing") {
            return Err(DeliveryError::Status {
                code: 404,
                body: Some("no such order".into()),
            });
        }

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(DeliveryError::status(503));
        }

        if request.body.is_null() {
            tracing::info!(method = %request.method, target = %request.target, "accepted");
            return Ok(DeliveryResponse::new(204, serde_json::Value::Null));
        }

        let order: OrderPayload = serde_json::from_value(request.body.clone())
            .map_err(|e| DeliveryError::Rejected(format!("json decode: {e}")))?;
        tracing::info!(
            method = %request.method,
            target = %request.target,
            sku = %order.sku,
            qty = order.qty,
            authorized = request.header("authorization").is_some(),
            "order accepted"
        );
        Ok(DeliveryResponse::new(201, json!({ "sku": order.sku })))
    }
}

struct SessionToken;

#[async_trait]
impl TokenProvider for SessionToken {
    async fn token(&self) -> Result<String, DeliveryError> {
        Ok("demo-session-token".to_string())
    }
}

struct LogEvents;

impl QueueEvents for LogEvents {
    fn on_success(&self, op: &QueuedOperation, response: &DeliveryResponse) {
        tracing::info!(op_id = %op.id, status = response.status, "delivered");
    }

    fn on_failure(&self, op: &QueuedOperation, error: &DeliveryError) {
        tracing::warn!(op_id = %op.id, %error, "gave up");
    }

    fn on_retry(&self, op: &QueuedOperation, error: &DeliveryError, delay: std::time::Duration) {
        tracing::info!(op_id = %op.id, retries = op.retries, ?delay, %error, "will retry");
    }

    fn on_status_change(&self, status: QueueStatus) {
        tracing::info!(%status, "queue status");
    }
}

async fn load_config() -> anyhow::Result<QueueConfig> {
    let mut config = match std::env::var("RELAY_CONFIG") {
        Ok(path) => QueueConfig::load(&path)
            .await
            .with_context(|| format!("loading queue config from {path}"))?,
        Err(_) => QueueConfig {
            backoff: BackoffConfig {
                initial_delay: Duration::from_millis(200),
                max_delay: Duration::from_secs(2),
                ..BackoffConfig::default()
            },
            breaker: Some(BreakerConfig {
                failure_threshold: 5,
                success_threshold: 1,
                reset_timeout: Duration::from_secs(2),
            }),
            ..QueueConfig::default()
        },
    };

    if let Ok(dir) = std::env::var("RELAY_STORE_DIR") {
        config.store = StoreConfig::File { path: PathBuf::from(dir) };
    } else if config.store == StoreConfig::Memory {
        config.store = StoreConfig::File {
            path: std::env::temp_dir().join("relay-demo"),
        };
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config().await?;
    tracing::info!(store = ?config.store, "starting relay demo");

    // (A) Queue starts offline; anything left from a previous run is restored.
    let monitor = NetworkMonitor::new(false);
    let queue = RequestQueueBuilder::new(Arc::new(FlakyOrderApi::new(2)))
        .config(config)
        .token_provider(Arc::new(SessionToken))
        .events(Arc::new(LogEvents))
        .online(monitor.is_online())
        .build()
        .await
        .context("building request queue")?;
    tracing::info!(restored = queue.pending_count(), "queue ready");

    let link = monitor.attach(queue.clone());
    let scheduler = DrainScheduler::spawn(queue.clone(), Duration::from_millis(250));

    // (B) Enqueue while offline. The stale Authorization header never hits disk.
    queue
        .enqueue(
            NewOperation::post("/orders")
                .with_body(json!({ "sku": "WIDGET-1", "qty": 3 }))
                .with_header("Authorization", "Bearer stale")
                .with_priority(5),
        )
        .await?;
    queue
        .enqueue(NewOperation::put("/orders/42").with_body(json!({ "sku": "GADGET-9", "qty": 1 })))
        .await?;
    queue.enqueue(NewOperation::delete("/orders/missing")).await?;
    tracing::info!(pending = queue.pending_count(), status = %queue.status(), "queued while offline");

    // (C) Connectivity comes back; draining starts on its own.
    sleep(Duration::from_millis(500)).await;
    monitor.report(true);

    let drained = tokio::time::timeout(Duration::from_secs(15), async {
        while !queue.is_empty() {
            sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(pending = queue.pending_count(), "gave up waiting; entries stay persisted");
    }

    // (D) Shut down background tasks and report.
    scheduler.shutdown_and_join().await;
    drop(monitor);
    link.await.context("network monitor task")?;

    println!("{}", serde_json::to_string_pretty(&queue.stats())?);
    Ok(())
}
