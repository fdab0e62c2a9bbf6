//! ReceiptGenerator port - receipt minting.
//!
//! # Implementations
//! - **UlidReceipts**: ULID from the caller's timestamp plus random bits

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::domain::ReceiptId;

/// Mints receipt tokens. Every call must return a token never seen before.
///
/// `now` is the instant of the operation the receipt is minted for, so an
/// engine call reads its clock once no matter how many receipts it mints.
pub trait ReceiptGenerator: Send + Sync {
    fn next_receipt(&self, now: DateTime<Utc>) -> ReceiptId;
}

/// ULID-based receipt generator: `now` as the timestamp part, random bits
/// for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidReceipts;

impl ReceiptGenerator for UlidReceipts {
    fn next_receipt(&self, now: DateTime<Utc>) -> ReceiptId {
        let timestamp_ms = now.timestamp_millis().max(0) as u64;
        ReceiptId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
