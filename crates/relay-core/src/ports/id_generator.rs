//! IdGenerator port - enqueue 時の ID 採番
//!
//! # 実装
//! - **UlidGenerator**: Clock 駆動の monotonic ULID（本番用）

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use ulid::{Generator, Ulid};

use crate::domain::OperationId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> OperationId;
}

/// ULID ids, timestamped from a `Clock`.
///
/// Ids generated within the same millisecond are strictly increasing
/// (monotonic generator), so id order matches enqueue order.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
    inner: Mutex<Generator>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Generator::new()),
        }
    }
}

impl IdGenerator for UlidGenerator {
    fn generate(&self) -> OperationId {
        let at = SystemTime::from(self.clock.now());
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let ulid = inner.generate_from_datetime(at).unwrap_or_else(|_| {
            // Random bits exhausted within one millisecond; fall back to a fresh ULID.
            let ms = self.clock.now().timestamp_millis().max(0) as u64;
            Ulid::from_parts(ms, rand::random())
        });
        OperationId::from_ulid(ulid)
    }
}
