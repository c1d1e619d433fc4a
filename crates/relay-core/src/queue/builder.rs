//! RequestQueueBuilder - キューの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 不正な `QueueConfig` や読めない store は、
//!   キューが仕事を受け付ける前に報告する
//! - 永続化済みエントリを読み込み、順序付けてから渡す

use std::sync::Arc;

use crate::domain::RelayError;
use crate::ports::{
    Clock, IdGenerator, NoopEvents, OperationStore, QueueEvents, SystemClock, TokenProvider,
    Transport, UlidGenerator,
};
use crate::resilience::{CircuitBreaker, RetryPredicate};

use super::config::QueueConfig;
use super::pending::PendingSet;
use super::request_queue::RequestQueue;

/// # Example
/// ```ignore
/// let queue = RequestQueueBuilder::new(Arc::new(transport))
///     .config(QueueConfig::load("relay.json").await?)
///     .token_provider(Arc::new(session))
///     .events(Arc::new(ui_events))
///     .build()
///     .await?;
/// ```
pub struct RequestQueueBuilder {
    transport: Arc<dyn Transport>,
    config: QueueConfig,
    store: Option<Arc<dyn OperationStore>>,
    breaker: Option<Arc<CircuitBreaker>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    events: Arc<dyn QueueEvents>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    retry_predicate: Option<RetryPredicate>,
    online: bool,
}

impl RequestQueueBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: QueueConfig::default(),
            store: None,
            breaker: None,
            token_provider: None,
            events: Arc::new(NoopEvents),
            clock: Arc::new(SystemClock),
            ids: None,
            retry_predicate: None,
            online: true,
        }
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this store instead of opening `config.store`.
    pub fn store(mut self, store: Arc<dyn OperationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing breaker (one per remote target). Takes precedence
    /// over `config.breaker`.
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn events(mut self, events: Arc<dyn QueueEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replace the status-based retry classification entirely.
    pub fn retry_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Initial connectivity (defaults to online).
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub async fn build(self) -> Result<RequestQueue, RelayError> {
        self.config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => self.config.store.open().await?,
        };

        let mut pending = PendingSet::new(self.config.ordering);
        for op in store.get_all().await? {
            pending.insert(op);
        }
        if !pending.is_empty() {
            tracing::info!(restored = pending.len(), "restored pending operations");
        }

        let breaker = self.breaker.or_else(|| {
            self.config.breaker.clone().map(|config| {
                Arc::new(CircuitBreaker::with_clock("relay", config, Arc::clone(&self.clock)))
            })
        });

        let mut policy = self.config.retry_policy();
        if let Some(predicate) = self.retry_predicate {
            policy.classifier = policy.classifier.with_predicate(predicate);
        }

        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&self.clock))));

        Ok(RequestQueue::from_parts(super::request_queue::Parts {
            store,
            transport: self.transport,
            token_provider: self.token_provider,
            events: self.events,
            breaker,
            policy,
            clock: self.clock,
            ids,
            auto_process: self.config.auto_process,
            pending,
            online: self.online,
        }))
    }
}
