//! Queue-wide status and counters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue-wide state.
///
/// Transitions:
/// - Idle -> Processing -> Idle (drain finished)
/// - any -> Offline (connectivity lost; overrides everything else)
/// - any -> Paused (explicit; survives reconnect until resumed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Idle,
    Processing,
    Paused,
    Offline,
}

impl QueueStatus {
    /// Derive the status from the queue's flags. Offline wins, then paused.
    pub fn derive(online: bool, paused: bool, draining: bool) -> Self {
        if !online {
            QueueStatus::Offline
        } else if paused {
            QueueStatus::Paused
        } else if draining {
            QueueStatus::Processing
        } else {
            QueueStatus::Idle
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Idle => "idle",
            QueueStatus::Processing => "processing",
            QueueStatus::Paused => "paused",
            QueueStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: u64,
    pub failed: u64,
}

/// What a single `process()` call did. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub succeeded: usize,
    pub dead_lettered: usize,
    pub retried: usize,
    pub deferred: usize,
}

impl DrainSummary {
    pub fn attempts(&self) -> usize {
        self.succeeded + self.dead_lettered + self.retried + self.deferred
    }
}
