//! Queue entries and leases.

use chrono::{DateTime, TimeDelta, Utc};

use super::EntryState;
use crate::domain::{Item, ReceiptId, Seq};

/// An enqueued item plus its visibility.
///
/// The entry map holds these; the visible index and the lease table only
/// refer to them by `Seq`.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub seq: Seq,
    pub item: Item,
    pub state: EntryState,
}

impl QueueEntry {
    pub fn new(seq: Seq, item: Item) -> Self {
        Self {
            seq,
            item,
            state: EntryState::Visible,
        }
    }

    /// Hide the entry behind a lease.
    pub fn lease(&mut self) {
        self.state = EntryState::Leased;
    }

    /// Make the entry eligible for reads again.
    pub fn release(&mut self) {
        self.state = EntryState::Visible;
    }
}

/// A live lease. Exists exactly while its entry is `Leased`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub receipt: ReceiptId,
    pub seq: Seq,
    pub leased_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(receipt: ReceiptId, seq: Seq, leased_at: DateTime<Utc>) -> Self {
        Self {
            receipt,
            seq,
            leased_at,
        }
    }

    /// A lease is expired once its age is strictly greater than `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.leased_at > ttl
    }
}
