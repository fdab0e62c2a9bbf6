//! Ports - seams the engine reads from.
//!
//! Time and receipt minting are the only things the engine does not own.
//! Both are traits so tests can make them deterministic.

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::id_generator::{ReceiptGenerator, UlidReceipts};
