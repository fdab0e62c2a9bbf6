//! Business outcomes of queue operations.
//!
//! Throttling and receipt problems are expected results, not errors: they
//! come back as variants here. `QueueError` is reserved for contract
//! violations by the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How much visible backlog a served call left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backlog {
    /// No visible entries remain.
    Drained,
    /// Visible entries remain; poll again soon.
    MoreData,
}

/// Items returned by a successful read or lease.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub items: Vec<T>,
    /// Pacing hint: wait this long before the next poll.
    pub retry_after: Duration,
    pub backlog: Backlog,
}

/// Result of `dequeue` / `get`.
#[derive(Debug, Clone, PartialEq)]
pub enum Polled<T> {
    Served(Batch<T>),
    /// Rate limit reached. Nothing was read or recorded.
    Throttled { retry_after: Duration },
}

impl<T> Polled<T> {
    /// Pacing hint, whichever way the call went.
    pub fn retry_after(&self) -> Duration {
        match self {
            Polled::Served(batch) => batch.retry_after,
            Polled::Throttled { retry_after } => *retry_after,
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Polled::Throttled { .. })
    }
}

/// Result of `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The lease was redeemed and the entry removed for good.
    Deleted,
    /// The receipt was already redeemed by an earlier delete.
    AlreadyDeleted,
    /// The lease timed out before the delete arrived.
    Expired,
    /// The receipt never belonged to this queue or is malformed.
    Unknown,
}

impl DeleteOutcome {
    pub fn is_deleted(self) -> bool {
        self == DeleteOutcome::Deleted
    }
}
