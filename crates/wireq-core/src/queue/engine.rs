//! In-process wireq: an at-least-once delivery queue with receipts.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use super::config::RATE_WINDOW;
use super::window::RateWindow;
use super::{Lease, QueueConfig, QueueEntry};
use crate::domain::{Backlog, Batch, DeleteOutcome, Item, LeasedItem, Polled, ReceiptId, Seq};
use crate::error::QueueError;
use crate::observability::QueueStats;
use crate::ports::{Clock, ReceiptGenerator, SystemClock, UlidReceipts};

/// All mutable queue state. Only ever touched under the engine lock.
struct EngineState {
    /// Every entry still in the queue, visible or leased, by arrival.
    entries: BTreeMap<Seq, QueueEntry>,

    /// Index of the visible subset of `entries`.
    visible: BTreeSet<Seq>,

    /// Live leases.
    leases: HashMap<ReceiptId, Lease>,

    /// Live leases ordered by lease time, for reclamation.
    expiry: BTreeSet<(DateTime<Utc>, ReceiptId)>,

    /// Receipts redeemed by a successful delete.
    deleted: HashSet<ReceiptId>,

    /// Receipts whose lease ran out before a delete.
    expired: HashSet<ReceiptId>,

    window: RateWindow,

    next_seq: u64,
    enqueued: u64,
    removed: u64,
}

impl EngineState {
    fn new(config: &QueueConfig) -> Self {
        let span = TimeDelta::from_std(RATE_WINDOW).unwrap_or(TimeDelta::MAX);
        Self {
            entries: BTreeMap::new(),
            visible: BTreeSet::new(),
            leases: HashMap::new(),
            expiry: BTreeSet::new(),
            deleted: HashSet::new(),
            expired: HashSet::new(),
            window: RateWindow::new(config.max_ops_per_minute(), span),
            next_seq: 1,
            enqueued: 0,
            removed: 0,
        }
    }

    fn allocate_seq(&mut self) -> Seq {
        let seq = Seq::new(self.next_seq);
        self.next_seq += 1;
        seq
    }

    fn push(&mut self, item: Item) -> Seq {
        let seq = self.allocate_seq();
        self.entries.insert(seq, QueueEntry::new(seq, item));
        self.visible.insert(seq);
        self.enqueued += 1;
        seq
    }

    /// Revert every lease older than `ttl`; their receipts become expired.
    fn reclaim_expired(&mut self, now: DateTime<Utc>, ttl: TimeDelta) {
        while let Some(&(_, receipt)) = self.expiry.first() {
            let due = self
                .leases
                .get(&receipt)
                .is_none_or(|lease| lease.is_expired(now, ttl));
            if !due {
                break; // ordered by lease time
            }
            self.expiry.pop_first();

            let Some(lease) = self.leases.remove(&receipt) else {
                continue;
            };
            if let Some(entry) = self.entries.get_mut(&lease.seq) {
                entry.release();
                self.visible.insert(lease.seq);
            }
            self.expired.insert(receipt);
            info!(%receipt, seq = %lease.seq, "lease expired, entry visible again");
        }
    }

    /// The `n` longest-waiting visible entries.
    fn oldest_visible(&self, n: usize) -> Vec<Seq> {
        self.visible.iter().take(n).copied().collect()
    }

    fn take(&mut self, seq: Seq) -> Option<Item> {
        self.visible.remove(&seq);
        let entry = self.entries.remove(&seq)?;
        self.removed += 1;
        Some(entry.item)
    }

    fn lease(&mut self, seq: Seq, receipt: ReceiptId, now: DateTime<Utc>) -> Option<LeasedItem> {
        let entry = self.entries.get_mut(&seq)?;
        entry.lease();
        let item = entry.item.clone();
        self.visible.remove(&seq);
        self.leases.insert(receipt, Lease::new(receipt, seq, now));
        self.expiry.insert((now, receipt));
        Some(LeasedItem::new(receipt, item))
    }

    fn redeem(&mut self, receipt: ReceiptId) -> DeleteOutcome {
        if self.deleted.contains(&receipt) {
            return DeleteOutcome::AlreadyDeleted;
        }
        if self.expired.contains(&receipt) {
            return DeleteOutcome::Expired;
        }
        let Some(lease) = self.leases.remove(&receipt) else {
            return DeleteOutcome::Unknown;
        };
        self.expiry.remove(&(lease.leased_at, receipt));
        if self.entries.remove(&lease.seq).is_some() {
            self.removed += 1;
        }
        self.deleted.insert(receipt);
        DeleteOutcome::Deleted
    }

    fn stats(&self) -> QueueStats {
        let visible = self.visible.len();
        QueueStats {
            visible,
            leased: self.entries.len() - visible,
            enqueued: self.enqueued,
            removed: self.removed,
            deleted_receipts: self.deleted.len(),
            expired_receipts: self.expired.len(),
            window_ops: self.window.len(),
        }
    }
}

/// The queue engine.
///
/// Every operation runs under one lock and reads the clock once, so
/// reclamation, selection and rate accounting inside a call all agree on
/// "now" and concurrent callers never see each other's half-done work.
///
/// # Example
/// ```
/// use wireq_core::queue::{QueueConfig, QueueEngine};
/// use wireq_core::domain::{DeleteOutcome, Polled};
///
/// let engine = QueueEngine::new(QueueConfig::default());
/// engine.enqueue(vec![serde_json::json!({"urn": "urn:newsml:1"})]);
///
/// let Polled::Served(batch) = engine.get(1).unwrap() else { panic!() };
/// let receipt = batch.items[0].receipt.to_string();
/// assert_eq!(engine.delete(&receipt), DeleteOutcome::Deleted);
/// ```
pub struct QueueEngine {
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    receipts: Box<dyn ReceiptGenerator>,
    state: Mutex<EngineState>,
}

impl QueueEngine {
    /// Engine on the wall clock.
    pub fn new(config: QueueConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Engine on a caller-supplied clock; receipts carry its timestamps.
    pub fn with_clock(config: QueueConfig, clock: impl Clock + 'static) -> Self {
        Self::with_ports(config, Arc::new(clock), UlidReceipts)
    }

    pub fn with_ports(
        config: QueueConfig,
        clock: Arc<dyn Clock>,
        receipts: impl ReceiptGenerator + 'static,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState::new(&config)),
            config,
            clock,
            receipts: Box::new(receipts),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // no operation can panic halfway through a mutation
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append items as visible entries, in order. Returns their sequence numbers.
    pub fn enqueue<I>(&self, items: I) -> Vec<Seq>
    where
        I: IntoIterator<Item = Item>,
    {
        let mut state = self.lock();
        let seqs: Vec<Seq> = items.into_iter().map(|item| state.push(item)).collect();
        debug!(count = seqs.len(), visible = state.visible.len(), "enqueued");
        seqs
    }

    /// Destructive read of up to `max_wanted` oldest visible items.
    pub fn dequeue(&self, max_wanted: usize) -> Result<Polled<Item>, QueueError> {
        self.check_wanted(max_wanted)?;
        Ok(self.dequeue_up_to(max_wanted))
    }

    /// Lease up to `max_wanted` oldest visible items behind fresh receipts.
    pub fn get(&self, max_wanted: usize) -> Result<Polled<LeasedItem>, QueueError> {
        self.check_wanted(max_wanted)?;
        Ok(self.lease_up_to(max_wanted))
    }

    /// `dequeue` with the configured cap.
    pub fn poll_dequeue(&self) -> Polled<Item> {
        self.dequeue_up_to(self.config.max_items_returned())
    }

    /// `get` with the configured cap.
    pub fn poll_get(&self) -> Polled<LeasedItem> {
        self.lease_up_to(self.config.max_items_returned())
    }

    fn dequeue_up_to(&self, max_wanted: usize) -> Polled<Item> {
        let now = self.clock.now();
        let mut state = self.lock();

        if let Some(throttled) = self.admit(&mut state, now) {
            return throttled;
        }

        let seqs = state.oldest_visible(max_wanted);
        let items: Vec<Item> = seqs.into_iter().filter_map(|seq| state.take(seq)).collect();
        state.window.record(now, items.len());

        let batch = self.batch(items, state.visible.len());
        debug!(served = batch.items.len(), backlog = ?batch.backlog, "dequeue");
        Polled::Served(batch)
    }

    fn lease_up_to(&self, max_wanted: usize) -> Polled<LeasedItem> {
        let now = self.clock.now();
        let mut state = self.lock();

        if let Some(throttled) = self.admit(&mut state, now) {
            return throttled;
        }

        let mut items = Vec::new();
        for seq in state.oldest_visible(max_wanted) {
            let receipt = self.receipts.next_receipt(now);
            if let Some(leased) = state.lease(seq, receipt, now) {
                items.push(leased);
            }
        }
        state.window.record(now, items.len());

        let batch = self.batch(items, state.visible.len());
        debug!(served = batch.items.len(), backlog = ?batch.backlog, "get");
        Polled::Served(batch)
    }

    /// Redeem a receipt as handed out by `get` (its `Display` form).
    ///
    /// Malformed receipts classify as `Unknown`.
    pub fn delete(&self, receipt: &str) -> DeleteOutcome {
        match receipt.parse::<ReceiptId>() {
            Ok(receipt) => self.delete_receipt(receipt),
            Err(err) => {
                debug!(%err, "delete with malformed receipt");
                DeleteOutcome::Unknown
            }
        }
    }

    pub fn delete_receipt(&self, receipt: ReceiptId) -> DeleteOutcome {
        let now = self.clock.now();
        let mut state = self.lock();
        state.reclaim_expired(now, self.config.lease_delta());

        let outcome = state.redeem(receipt);
        match outcome {
            DeleteOutcome::Deleted => info!(%receipt, "receipt redeemed, entry removed"),
            other => debug!(%receipt, outcome = ?other, "delete rejected"),
        }
        outcome
    }

    /// Point-in-time counters. Does not reclaim expired leases.
    pub fn stats(&self) -> QueueStats {
        self.lock().stats()
    }

    /// Entries still in the queue, visible or leased.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_wanted(&self, max_wanted: usize) -> Result<(), QueueError> {
        let cap = self.config.max_items_returned();
        if max_wanted > cap {
            return Err(QueueError::MaxWantedExceedsCap {
                wanted: max_wanted,
                cap,
            });
        }
        Ok(())
    }

    /// Reclaim, then rate-check. `Some` means the call is throttled.
    fn admit<T>(&self, state: &mut EngineState, now: DateTime<Utc>) -> Option<Polled<T>> {
        state.reclaim_expired(now, self.config.lease_delta());
        if state.window.is_exhausted(now) {
            warn!(
                window_ops = state.window.len(),
                limit = self.config.max_ops_per_minute(),
                "rate limit reached, call throttled"
            );
            return Some(Polled::Throttled {
                retry_after: self.config.retry_after_throttled(),
            });
        }
        None
    }

    fn batch<T>(&self, items: Vec<T>, remaining_visible: usize) -> Batch<T> {
        let (retry_after, backlog) = self.pace(remaining_visible);
        Batch {
            items,
            retry_after,
            backlog,
        }
    }

    fn pace(&self, remaining_visible: usize) -> (Duration, Backlog) {
        if remaining_visible == 0 {
            (self.config.retry_after_drained(), Backlog::Drained)
        } else {
            (self.config.retry_after_more_data(), Backlog::MoreData)
        }
    }
}

impl std::fmt::Debug for QueueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEngine")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
