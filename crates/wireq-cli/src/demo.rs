//! Direct-call harness: a get/delete consumer against an in-process engine.

use std::time::Duration;

use tracing::{debug, info, warn};
use wireq_core::{Backlog, Item, Polled, QueueEngine};

/// What one drain run saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub received: Vec<Item>,
    pub polls: usize,
    pub throttled: usize,
    pub rejected_deletes: usize,
}

/// Poll with `get`, delete every received entry, and follow the pacing
/// hints (multiplied by `time_scale`) until a poll reports a drained queue.
pub async fn drain(engine: &QueueEngine, time_scale: f64) -> DrainReport {
    let mut report = DrainReport::default();

    loop {
        report.polls += 1;
        let polled = engine.poll_get();
        let pause = scaled(polled.retry_after(), time_scale);

        match polled {
            Polled::Throttled { retry_after } => {
                report.throttled += 1;
                warn!(retry_after = retry_after.as_secs(), "throttled, backing off");
            }
            Polled::Served(batch) => {
                debug!(entries = batch.items.len(), "received");
                for leased in batch.items {
                    let outcome = engine.delete_receipt(leased.receipt);
                    if outcome.is_deleted() {
                        report.received.push(leased.item);
                    } else {
                        report.rejected_deletes += 1;
                        warn!(receipt = %leased.receipt, ?outcome, "delete rejected");
                    }
                }
                if batch.backlog == Backlog::Drained {
                    break;
                }
            }
        }
        info!(waiting_ms = pause.as_millis() as u64, "pacing");
        tokio::time::sleep(pause).await;
    }

    report
}

/// Longest pause any scaled hint may produce.
pub const MAX_PAUSE: Duration = Duration::from_secs(3_600);

/// `hint` multiplied by `time_scale`, clamped to `0..=MAX_PAUSE`.
///
/// Negative and NaN factors mean no pause; overflowing ones cap out.
pub fn scaled(hint: Duration, time_scale: f64) -> Duration {
    if time_scale.is_nan() || time_scale <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(hint.as_secs_f64() * time_scale)
        .map_or(MAX_PAUSE, |pause| pause.min(MAX_PAUSE))
}
