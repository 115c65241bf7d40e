use crate::error::QueueError;
use crate::job::ResultReceiver;

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing;

/// Removes a job from its queue's wait list if it has not started, settling
/// its handle with `CancelledBeforeStart`. Type-erased so handles do not carry
/// the queue's argument type.
pub(crate) type DequeueFn = Arc<dyn Fn(u64) + Send + Sync>;

/// A handle to a job submitted to a [`crate::JobQueue`].
///
/// Allows requesting cancellation of the job and awaiting its result. The
/// handle is returned synchronously from `submit` whether the job started
/// immediately, was parked, or was rejected outright.
pub struct JobHandle<T: Send + 'static, E: Send + 'static> {
  pub(crate) job_id: u64,
  pub(crate) token: CancellationToken,
  pub(crate) result_receiver: ResultReceiver<T, E>,
  pub(crate) dequeue: DequeueFn,
}

impl<T: Send + 'static, E: Send + 'static> JobHandle<T, E> {
  /// Returns the unique ID of this job.
  pub fn id(&self) -> u64 {
    self.job_id
  }

  /// Checks if cancellation has been requested for this job.
  pub fn is_cancellation_requested(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Requests cancellation of this job.
  ///
  /// If the job is still waiting it is removed from the queue, the handler is
  /// never invoked for it, and [`JobHandle::await_result`] yields
  /// [`QueueError::CancelledBeforeStart`]. If the job is already running the
  /// request is forwarded to the handler's token; whether and how the job
  /// settles is then up to the handler's own cancellation logic.
  pub fn cancel(&self) {
    tracing::debug!(job_id = %self.job_id, "JobHandle: cancellation requested");
    (self.dequeue)(self.job_id);
    self.token.cancel();
  }

  /// Returns a detached canceller for this job, usable after the handle has
  /// been consumed by [`JobHandle::await_result`].
  pub fn canceller(&self) -> JobCanceller {
    JobCanceller {
      job_id: self.job_id,
      token: self.token.clone(),
      dequeue: self.dequeue.clone(),
    }
  }

  /// Awaits the job's settlement and returns its result.
  ///
  /// # Errors
  /// Returns [`QueueError::QueueFull`] if admission was rejected,
  /// [`QueueError::CancelledBeforeStart`] if the job was cancelled while
  /// waiting, [`QueueError::Handler`] with the handler's own error,
  /// [`QueueError::JobPanicked`] if the handler panicked, or
  /// [`QueueError::ResultChannelClosed`] if the queue side was torn down
  /// without settling the job.
  pub async fn await_result(self) -> Result<T, QueueError<E>> {
    match self.result_receiver.await {
      Ok(outcome) => outcome,
      Err(recv_error) => {
        tracing::warn!(job_id = %self.job_id, "result channel closed without a settlement: {}", recv_error);
        Err(QueueError::ResultChannelClosed)
      }
    }
  }
}

impl<T: Send + 'static, E: Send + 'static> fmt::Debug for JobHandle<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("JobHandle")
      .field("job_id", &self.job_id)
      .field("cancellation_requested", &self.token.is_cancelled())
      .finish_non_exhaustive()
  }
}

/// A clonable cancellation handle for one job, detached from its result.
///
/// Used by the batch aggregators to fan cancellation out over many jobs whose
/// [`JobHandle`]s have already been consumed.
#[derive(Clone)]
pub struct JobCanceller {
  pub(crate) job_id: u64,
  pub(crate) token: CancellationToken,
  pub(crate) dequeue: DequeueFn,
}

impl JobCanceller {
  /// Returns the unique ID of the job this canceller belongs to.
  pub fn id(&self) -> u64 {
    self.job_id
  }

  /// Requests cancellation, with the same semantics as [`JobHandle::cancel`].
  /// A request against an already-settled job is a no-op.
  pub fn cancel(&self) {
    tracing::trace!(job_id = %self.job_id, "JobCanceller: cancellation requested");
    (self.dequeue)(self.job_id);
    self.token.cancel();
  }
}

impl fmt::Debug for JobCanceller {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("JobCanceller")
      .field("job_id", &self.job_id)
      .field("cancellation_requested", &self.token.is_cancelled())
      .finish_non_exhaustive()
  }
}
