//! Queue module: entry state, leases, rate window and the engine.

mod config;
mod engine;
mod record;
mod state;
mod window;

pub use config::{QueueConfig, QueueConfigBuilder, RATE_WINDOW};
pub use engine::QueueEngine;
pub use record::{Lease, QueueEntry};
pub use state::EntryState;
