//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryStore**: 揮発性、テストや短命なキュー向け
//! - **FileStore**: 永続、1 operation = 1 JSON ドキュメント
//! - **FnTransport**: クロージャを `Transport` として使う
//!
//! `StoreConfig` は設定から永続化バックエンドを選びます。

pub mod file_store;
pub mod fn_transport;
pub mod memory_store;

pub use self::file_store::FileStore;
pub use self::fn_transport::FnTransport;
pub use self::memory_store::InMemoryStore;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::StoreError;
use crate::ports::OperationStore;

/// Which persistence backend a queue uses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    File {
        path: PathBuf,
    },
}

impl StoreConfig {
    pub async fn open(&self) -> Result<Arc<dyn OperationStore>, StoreError> {
        match self {
            StoreConfig::Memory => Ok(Arc::new(InMemoryStore::new())),
            StoreConfig::File { path } => Ok(Arc::new(FileStore::open(path.clone()).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_config_is_tagged() {
        let cfg: StoreConfig =
            serde_json::from_str(r#"{"kind": "file", "path": "/tmp/relay"}"#).unwrap();
        assert_eq!(
            cfg,
            StoreConfig::File {
                path: PathBuf::from("/tmp/relay")
            }
        );

        let cfg: StoreConfig = serde_json::from_str(r#"{"kind": "memory"}"#).unwrap();
        assert_eq!(cfg, StoreConfig::Memory);
    }

    #[tokio::test]
    async fn open_file_backend_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue");
        let store = StoreConfig::File { path: path.clone() }.open().await.unwrap();

        assert!(path.is_dir());
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
