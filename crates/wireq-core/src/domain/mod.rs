//! Domain model: identifiers, items and operation outcomes.

pub mod ids;
pub mod item;
pub mod outcome;

pub use ids::{IdMarker, ParseIdError, ReceiptId, Seq};
pub use item::{Item, LeasedItem, RECEIPT_FIELD};
pub use outcome::{Backlog, Batch, DeleteOutcome, Polled};
