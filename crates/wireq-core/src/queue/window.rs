//! Sliding-window rate limit over read and lease operations.

use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};

/// Timestamps of recent operations, oldest first.
#[derive(Debug, Clone)]
pub(crate) struct RateWindow {
    stamps: VecDeque<DateTime<Utc>>,
    limit: usize,
    span: TimeDelta,
}

impl RateWindow {
    pub(crate) fn new(limit: usize, span: TimeDelta) -> Self {
        Self {
            stamps: VecDeque::new(),
            limit,
            span,
        }
    }

    /// Drop every stamp that is `span` or more older than `now`.
    pub(crate) fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.stamps.front() {
            if now - *oldest < self.span {
                break;
            }
            self.stamps.pop_front();
        }
    }

    /// Prunes, then reports whether the limit has been reached.
    pub(crate) fn is_exhausted(&mut self, now: DateTime<Utc>) -> bool {
        self.prune(now);
        self.stamps.len() >= self.limit
    }

    /// Record `ops` operations at `now`.
    pub(crate) fn record(&mut self, now: DateTime<Utc>, ops: usize) {
        self.stamps.extend(std::iter::repeat_n(now, ops));
    }

    pub(crate) fn len(&self) -> usize {
        self.stamps.len()
    }
}
