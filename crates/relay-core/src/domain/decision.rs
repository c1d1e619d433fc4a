//! Decision model: what happens to an operation after a failed attempt.

use std::time::Duration;

/// The next action for a failed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Keep the entry and try again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Remove the entry and report it as failed.
    DeadLetter { reason: String },

    /// The attempt never reached the remote (circuit open). The entry keeps
    /// its retry budget.
    Defer,
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Decision::DeadLetter { .. })
    }
}
