//! Ports - 抽象化レイヤー
//!
//! キューが自分のメモリの外側に触れるものは、すべてここの trait を経由します。
//! 永続化、ネットワーク呼び出し、認証情報、コールバック、時刻、ID 生成。
//!
//! # 設計原則
//! - OperationStore が再起動後の正本
//! - Transport は 1 回の呼び出しだけを担当（リトライはキュー側）
//! - 認証情報は送信直前に TokenProvider から取得し、永続化しない

pub mod clock;
pub mod connectivity;
pub mod event_sink;
pub mod id_generator;
pub mod store;
pub mod transport;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::connectivity::ConnectivityProbe;
pub use self::event_sink::{NoopEvents, QueueEvents};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::store::OperationStore;
pub use self::transport::{TokenProvider, Transport};
