use thiserror::Error;

/// Rejected configuration for a [`crate::JobQueue`].
///
/// Construction validates synchronously; none of these ever travel through a
/// job's result channel when a queue is built directly. The batch helpers
/// (`all`/`any`) normalize them into [`QueueError::InvalidConfiguration`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
  #[error("concurrency limit must be at least 1")]
  ConcurrencyTooLow,

  #[error("queue limit must be at least 1")]
  LimitTooLow,

  #[error("queue limit {limit} is below the concurrency limit {concurrency}")]
  LimitBelowConcurrency { concurrency: usize, limit: usize },
}

/// Errors delivered through a job's result channel or a batch aggregate.
///
/// `E` is the handler's own error type; it travels through
/// [`QueueError::Handler`] untouched.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError<E> {
  #[error("invalid queue configuration: {0}")]
  InvalidConfiguration(#[from] ConfigError),

  #[error("queue is at its hard limit, job rejected")]
  QueueFull,

  #[error("job was cancelled before it started")]
  CancelledBeforeStart,

  #[error("job handler reported a failure")]
  Handler(E),

  #[error("no jobs were provided")]
  EmptyJobSet,

  #[error("job handler panicked during execution")]
  JobPanicked,

  #[error("job result channel closed before a result was delivered")]
  ResultChannelClosed,
}
