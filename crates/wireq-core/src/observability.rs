use serde::{Deserialize, Serialize};

/// Point-in-time counters for one engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Entries eligible for reads.
    pub visible: usize,
    /// Entries hidden behind a lease.
    pub leased: usize,
    /// Items ever enqueued.
    pub enqueued: u64,
    /// Items removed for good, by dequeue or successful delete.
    pub removed: u64,
    pub deleted_receipts: usize,
    pub expired_receipts: usize,
    /// Operations counted in the current rate window.
    pub window_ops: usize,
}

impl QueueStats {
    /// Nothing lost, nothing duplicated: queued + removed == enqueued.
    pub fn is_conserved(&self) -> bool {
        (self.visible + self.leased) as u64 + self.removed == self.enqueued
    }
}
