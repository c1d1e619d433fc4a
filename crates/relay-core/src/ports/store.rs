//! OperationStore port - 保留中 operation の永続化
//!
//! store は受け身です（順序付けもリトライもしない）。書き込むのはキューだけで、
//! 再起動後は `get_all` の結果を正本として扱います。
//!
//! # 実装
//! - **InMemoryStore**: テスト用
//! - **FileStore**: 1 operation = 1 JSON ファイル

use async_trait::async_trait;

use crate::domain::{OperationId, QueuedOperation, StoreError};

#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Insert or replace the record with `op.id`.
    async fn put(&self, op: &QueuedOperation) -> Result<(), StoreError>;

    /// Remove a record. Deleting a missing id is not an error.
    async fn delete(&self, id: OperationId) -> Result<(), StoreError>;

    /// Every persisted record, in no particular order.
    async fn get_all(&self) -> Result<Vec<QueuedOperation>, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}
