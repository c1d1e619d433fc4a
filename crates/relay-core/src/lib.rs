//! relay-core
//!
//! 状態を変更するネットワーク呼び出しを確実に届けるためのコア部品。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, operation, status, decision, errors）
//! - **ports**: 抽象化レイヤー（OperationStore, Transport, TokenProvider, QueueEvents, Clock など）
//! - **impls**: 実装（InMemoryStore, FileStore, FnTransport）
//! - **resilience**: backoff、リトライ判定、circuit breaker、retry ラッパー
//! - **queue**: `RequestQueue` とその builder / config
//! - **app**: 接続監視と drain スケジューラ

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod resilience;

pub(crate) mod duration_ms;

pub use app::{DrainScheduler, NetworkMonitor};
pub use domain::{
    DeliveryError, DeliveryResponse, Method, NewOperation, OperationId, OutgoingRequest,
    QueueStats, QueueStatus, QueuedOperation, RelayError, StoreError,
};
pub use queue::{QueueConfig, RequestQueue, RequestQueueBuilder};
pub use resilience::{CircuitBreaker, RetryPolicy};
