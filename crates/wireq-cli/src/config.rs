//! Queue settings from flags or environment.
//!
//! Variable names match the ones the local test server always used, so an
//! existing `.env` keeps working.

use std::time::Duration;

use clap::Args;
use wireq_core::{ConfigError, QueueConfig};

#[derive(Debug, Clone, Args)]
pub struct QueueArgs {
    /// Maximum entries returned by one poll
    #[arg(long, env = "MAX_ITEMS_RETURNED", default_value_t = 50)]
    pub max_items_returned: usize,

    /// retry-after (seconds) once a poll drained the queue
    #[arg(long, env = "RETRY_AFTER", default_value_t = 100)]
    pub retry_after: u64,

    /// retry-after (seconds) while more entries are waiting
    #[arg(long, env = "RETRY_AFTER_MORE_DATA", default_value_t = 10)]
    pub retry_after_more_data: u64,

    /// retry-after (seconds) on 429 responses
    #[arg(long, env = "RETRY_AFTER_TOO_MANY_REQUESTS", default_value_t = 360)]
    pub retry_after_too_many_requests: u64,

    /// Entries served per trailing minute before polls are throttled
    #[arg(long, env = "MAX_REQUESTS_PER_MINUTE", default_value_t = 200)]
    pub max_requests_per_minute: usize,

    /// Seconds a receipt stays redeemable
    #[arg(long, env = "WIREQ_RECEIPT_LIFETIME_DURATION", default_value_t = 200)]
    pub receipt_lifetime: u64,
}

impl QueueArgs {
    pub fn to_config(&self) -> Result<QueueConfig, ConfigError> {
        QueueConfig::builder()
            .max_items_returned(self.max_items_returned)
            .retry_after_drained(Duration::from_secs(self.retry_after))
            .retry_after_more_data(Duration::from_secs(self.retry_after_more_data))
            .retry_after_throttled(Duration::from_secs(self.retry_after_too_many_requests))
            .max_ops_per_minute(self.max_requests_per_minute)
            .lease_duration(Duration::from_secs(self.receipt_lifetime))
            .build()
    }
}
