//! InMemoryStore - テスト用・一時キュー用の揮発性 store
//!
//! # 学習ポイント
//! - tokio::sync::Mutex + HashMap による非同期 store
//! - 1 つの `Arc<InMemoryStore>` を 2 つのキューで順に使うと再起動を再現できる

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{OperationId, QueuedOperation, StoreError};
use crate::ports::OperationStore;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<OperationId, QueuedOperation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn get(&self, id: OperationId) -> Option<QueuedOperation> {
        self.records.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl OperationStore for InMemoryStore {
    async fn put(&self, op: &QueuedOperation) -> Result<(), StoreError> {
        self.records.lock().await.insert(op.id, op.clone());
        Ok(())
    }

    async fn delete(&self, id: OperationId) -> Result<(), StoreError> {
        self.records.lock().await.remove(&id);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<QueuedOperation>, StoreError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.records.lock().await.clear();
        Ok(())
    }
}
