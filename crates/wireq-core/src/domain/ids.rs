//! Domain identifiers (strongly-typed IDs).
//!
//! Receipts are ULIDs wrapped in a phantom-typed `Id<T>`, so a receipt can
//! never be confused with another kind of identifier at compile time.
//! ULIDs sort by creation time, which keeps the lease expiry index ordered
//! even when two leases share a timestamp.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait for each id kind.
///
/// Provides the prefix used by `Display` and accepted by `FromStr`.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
#[repr(transparent)]
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

// Manual impls: derives would put bounds on `T`, which is never instantiated.
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: IdMarker> Copy for Id<T> {}

impl<T: IdMarker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ulid == other.ulid
    }
}

impl<T: IdMarker> Eq for Id<T> {}

impl<T: IdMarker> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ulid.hash(state);
    }
}

impl<T: IdMarker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: IdMarker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ulid.cmp(&other.ulid)
    }
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when a string is not a well-formed id of the expected kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed id: {0:?}")]
pub struct ParseIdError(pub String);

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(T::prefix())
            .ok_or_else(|| ParseIdError(s.to_string()))?;
        let ulid = Ulid::from_string(raw).map_err(|_| ParseIdError(s.to_string()))?;
        Ok(Self::from_ulid(ulid))
    }
}

/// Receipt marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Receipt {}

impl IdMarker for Receipt {
    fn prefix() -> &'static str {
        "rcpt-"
    }
}

/// Identifier of a lease, handed to the consumer as the wireq receipt.
pub type ReceiptId = Id<Receipt>;

/// Arrival sequence number. Total order over every entry ever enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Seq(u64);

impl Seq {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn receipt_display_roundtrips_through_from_str() {
        let receipt = ReceiptId::from_ulid(Ulid::new());
        let text = receipt.to_string();
        assert!(text.starts_with("rcpt-"));
        assert_eq!(text.parse::<ReceiptId>().unwrap(), receipt);
    }

    #[rstest]
    #[case("")]
    #[case("rcpt-")]
    #[case("rcpt-not-a-ulid")]
    #[case("01ARZ3NDEKTSV4RRFFQ69G5FAV")]
    #[case("task-01ARZ3NDEKTSV4RRFFQ69G5FAV")]
    #[case("9f1c6d8e-2b7a-4a51-9a0e-3c4f1e0a2b6d")]
    fn malformed_receipts_are_rejected(#[case] input: &str) {
        assert!(input.parse::<ReceiptId>().is_err());
    }

    #[test]
    fn receipts_serialize_as_bare_ulid() {
        let receipt = ReceiptId::from_ulid(Ulid::new());
        let json = serde_json::to_string(&receipt).unwrap();
        assert_eq!(json, format!("\"{}\"", receipt.as_ulid()));
        let back: ReceiptId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, receipt);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<ReceiptId>(), std::mem::size_of::<Ulid>());
    }

    #[test]
    fn seq_orders_by_arrival() {
        assert!(Seq::new(1) < Seq::new(2));
        assert_eq!(Seq::new(7).to_string(), "#7");
    }
}
