//! FileStore - 永続 store（保留中 operation ごとに 1 JSON ドキュメント）
//!
//! 配置: `<dir>/<ulid>.json`。書き込みはまず `<ulid>.json.tmp` に行い、
//! rename で置き換えるので、書き込み途中でクラッシュしても
//! 壊れたファイルは残らない（旧レコードか新レコードのどちらか）。
//!
//! # 学習ポイント
//! - tokio::fs による非同期ファイル I/O
//! - tmp + rename によるアトミックな置き換え
//! - 読めないレコードを `StoreError::Corrupt` として報告

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::{OperationId, QueuedOperation, StoreError};
use crate::ports::OperationStore;

const RECORD_EXT: &str = "json";
const TMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "opened file store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: OperationId) -> PathBuf {
        self.dir.join(format!("{}.{RECORD_EXT}", id.as_ulid()))
    }

    fn is_record(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == RECORD_EXT)
    }

    fn is_leftover_tmp(path: &Path) -> bool {
        path.to_string_lossy().ends_with(TMP_SUFFIX)
    }
}

#[async_trait]
impl OperationStore for FileStore {
    async fn put(&self, op: &QueuedOperation) -> Result<(), StoreError> {
        let path = self.record_path(op.id);
        let tmp = path.with_extension(format!("{RECORD_EXT}{TMP_SUFFIX}"));
        let bytes = serde_json::to_vec_pretty(op)?;

        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, id: OperationId) -> Result<(), StoreError> {
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all(&self) -> Result<Vec<QueuedOperation>, StoreError> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !Self::is_record(&path) {
                continue;
            }

            let bytes = fs::read(&path).await?;
            let op: QueuedOperation =
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            records.push(op);
        }

        Ok(records)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if Self::is_record(&path) || Self::is_leftover_tmp(&path) {
                match fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(())
    }
}
