use thiserror::Error;

/// Contract violations by the caller.
///
/// Throttling and receipt problems are not errors; see `Polled` and
/// `DeleteOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("max_wanted={wanted} exceeds the configured cap of {cap} items per call")]
    MaxWantedExceedsCap { wanted: usize, cap: usize },
}

/// Rejected queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("{0} is too large to represent")]
    OutOfRange(&'static str),
}
