//! Entry state machine.

use serde::{Deserialize, Serialize};

/// Visibility of a queue entry.
///
/// State transitions:
/// - Visible -> Leased (get)
/// - Leased -> Visible (lease expiry)
/// - Visible -> removed (dequeue)
/// - Leased -> removed (delete with a live receipt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Eligible for dequeue and get.
    Visible,

    /// Held by a consumer under a lease; hidden from every read.
    Leased,
}

impl EntryState {
    pub fn is_visible(self) -> bool {
        matches!(self, EntryState::Visible)
    }
}
