//! Queue configuration, fixed at construction.

use std::time::Duration;

use chrono::TimeDelta;

use crate::error::ConfigError;

/// Length of the trailing rate-limit window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Validated queue configuration.
///
/// Construct through `QueueConfig::builder()`; `build()` rejects zero
/// values so an engine never runs with a nonsensical setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    max_items_returned: usize,
    retry_after_drained: Duration,
    retry_after_more_data: Duration,
    retry_after_throttled: Duration,
    max_ops_per_minute: usize,
    lease_duration: Duration,
}

impl QueueConfig {
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }

    /// Cap on items returned by a single read or lease call.
    pub fn max_items_returned(&self) -> usize {
        self.max_items_returned
    }

    /// Pacing hint when a call leaves no visible backlog.
    pub fn retry_after_drained(&self) -> Duration {
        self.retry_after_drained
    }

    /// Pacing hint when visible backlog remains after a call.
    pub fn retry_after_more_data(&self) -> Duration {
        self.retry_after_more_data
    }

    /// Pacing hint on a throttled call.
    pub fn retry_after_throttled(&self) -> Duration {
        self.retry_after_throttled
    }

    pub fn max_ops_per_minute(&self) -> usize {
        self.max_ops_per_minute
    }

    /// How long a receipt stays redeemable.
    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    pub(crate) fn lease_delta(&self) -> TimeDelta {
        // validated in build()
        TimeDelta::from_std(self.lease_duration).unwrap_or(TimeDelta::MAX)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_items_returned: 50,
            retry_after_drained: Duration::from_secs(100),
            retry_after_more_data: Duration::from_secs(10),
            retry_after_throttled: Duration::from_secs(360),
            max_ops_per_minute: 200,
            lease_duration: Duration::from_secs(200),
        }
    }
}

/// Builder for `QueueConfig`. Unset fields keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    pub fn max_items_returned(mut self, n: usize) -> Self {
        self.config.max_items_returned = n;
        self
    }

    pub fn retry_after_drained(mut self, d: Duration) -> Self {
        self.config.retry_after_drained = d;
        self
    }

    pub fn retry_after_more_data(mut self, d: Duration) -> Self {
        self.config.retry_after_more_data = d;
        self
    }

    pub fn retry_after_throttled(mut self, d: Duration) -> Self {
        self.config.retry_after_throttled = d;
        self
    }

    pub fn max_ops_per_minute(mut self, n: usize) -> Self {
        self.config.max_ops_per_minute = n;
        self
    }

    pub fn lease_duration(mut self, d: Duration) -> Self {
        self.config.lease_duration = d;
        self
    }

    pub fn build(self) -> Result<QueueConfig, ConfigError> {
        let c = self.config;
        positive_count("max_items_returned", c.max_items_returned)?;
        positive_count("max_ops_per_minute", c.max_ops_per_minute)?;
        positive_duration("retry_after_drained", c.retry_after_drained)?;
        positive_duration("retry_after_more_data", c.retry_after_more_data)?;
        positive_duration("retry_after_throttled", c.retry_after_throttled)?;
        positive_duration("lease_duration", c.lease_duration)?;
        TimeDelta::from_std(c.lease_duration)
            .map_err(|_| ConfigError::OutOfRange("lease_duration"))?;
        Ok(c)
    }
}

fn positive_count(name: &'static str, n: usize) -> Result<(), ConfigError> {
    if n == 0 {
        return Err(ConfigError::NotPositive(name));
    }
    Ok(())
}

fn positive_duration(name: &'static str, d: Duration) -> Result<(), ConfigError> {
    if d.is_zero() {
        return Err(ConfigError::NotPositive(name));
    }
    Ok(())
}
