//! App - `RequestQueue` を動かすバックグラウンド処理
//!
//! # 主要コンポーネント
//! - **NetworkMonitor**: 接続状態の遷移を配信（任意でポーリング probe）
//! - **DrainScheduler**: backoff 中のエントリのための定期 `process()`

mod background;
pub mod network_monitor;
pub mod scheduler;

pub use self::background::BackgroundTask;
pub use self::network_monitor::NetworkMonitor;
pub use self::scheduler::DrainScheduler;
