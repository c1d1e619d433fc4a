//! ConnectivityProbe port - ネットワークが使えるかをプラットフォームに問い合わせる

use async_trait::async_trait;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}
