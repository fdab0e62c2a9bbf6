//! wireq-core
//!
//! In-process simulation of the wireq delivery queue: items are either
//! dequeued destructively or leased behind a receipt that must be redeemed
//! before it expires. Expired leases put their items back in line, which
//! gives at-least-once delivery. Reads are paced with retry-after hints
//! and limited by a sliding one-minute window.
//!
//! # Modules
//! - **domain**: ids, items, operation outcomes
//! - **ports**: clock and receipt generator seams
//! - **queue**: configuration and `QueueEngine`
//! - **observability**: `QueueStats`
//! - **error**: contract and configuration errors

pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod queue;

pub use domain::{Backlog, Batch, DeleteOutcome, Item, LeasedItem, Polled, ReceiptId};
pub use error::{ConfigError, QueueError};
pub use observability::QueueStats;
pub use queue::{QueueConfig, QueueEngine};
