//! PendingSet - the queue's in-memory view of pending operations.
//!
//! Entries are kept by id (single source of truth) plus an ordered index
//! that defines drain order.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::domain::{OperationId, QueuedOperation};

use super::config::OrderingMode;

/// Drain-order key.
///
/// Higher priority first, then id. Ids come from a monotonic ULID generator,
/// so id order is submission order even if the wall clock steps backwards
/// between two enqueues. `created_at` is informational and never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OrderKey {
    priority: i32,
    id: OperationId,
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse on priority: larger values sort first
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug)]
pub struct PendingSet {
    ordering: OrderingMode,
    entries: HashMap<OperationId, QueuedOperation>,
    order: BTreeSet<OrderKey>,
}

impl PendingSet {
    pub fn new(ordering: OrderingMode) -> Self {
        Self {
            ordering,
            entries: HashMap::new(),
            order: BTreeSet::new(),
        }
    }

    fn key_for(&self, op: &QueuedOperation) -> OrderKey {
        let priority = match self.ordering {
            OrderingMode::Priority => op.priority,
            OrderingMode::Fifo => 0,
        };
        OrderKey { priority, id: op.id }
    }

    /// Insert or replace an entry. Returns the previous version, if any.
    pub fn insert(&mut self, op: QueuedOperation) -> Option<QueuedOperation> {
        let previous = self.remove(op.id);
        self.order.insert(self.key_for(&op));
        self.entries.insert(op.id, op);
        previous
    }

    pub fn remove(&mut self, id: OperationId) -> Option<QueuedOperation> {
        let op = self.entries.remove(&id)?;
        let key = self.key_for(&op);
        self.order.remove(&key);
        Some(op)
    }

    pub fn get(&self, id: OperationId) -> Option<&QueuedOperation> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Entries in drain order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedOperation> + '_ {
        self.order.iter().filter_map(|key| self.entries.get(&key.id))
    }

    /// The first entry in drain order that is due at `now` and not in `skip`.
    pub fn next_due(&self, now: DateTime<Utc>, skip: &HashSet<OperationId>) -> Option<&QueuedOperation> {
        self.iter()
            .find(|op| !skip.contains(&op.id) && op.is_due(now))
    }

    /// Earliest scheduled retry among entries that are waiting on backoff.
    pub fn earliest_not_before(&self) -> Option<DateTime<Utc>> {
        self.entries.values().filter_map(|op| op.not_before).min()
    }
}
