use crate::error::{ConfigError, QueueError};
use crate::handle::{DequeueFn, JobHandle};
use crate::job::{JobFuture, JobHandler, ResultSender, WaitingJob};

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

lazy_static::lazy_static! {
  static ref NEXT_JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// A bounded-concurrency job queue.
///
/// At most `concurrency` handler invocations are in flight at any time.
/// Excess submissions are parked in FIFO order and started one-for-one as
/// running jobs settle. With a hard `limit` set, submissions that would push
/// `running + waiting` past it are rejected with [`QueueError::QueueFull`]
/// instead of being parked.
///
/// `submit` never blocks: it returns a [`JobHandle`] synchronously whether
/// the job started immediately, was parked, or was rejected. Jobs are spawned
/// onto the ambient Tokio runtime, so `submit` must be called from within
/// runtime context.
///
/// Dropping the queue rejects every still-waiting job with
/// [`QueueError::CancelledBeforeStart`]; jobs already running are left to
/// settle on their own.
pub struct JobQueue<A, T, E>
where
  A: Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  inner: Arc<QueueInner<A, T, E>>,
  dequeue_hook: DequeueFn,
}

struct QueueInner<A, T, E>
where
  A: Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  concurrency: usize,
  limit: Option<usize>,
  handler: JobHandler<A, T, E>,
  state: Mutex<QueueState<A, T, E>>,
}

struct QueueState<A, T, E> {
  running: usize,
  waiting: VecDeque<WaitingJob<A, T, E>>,
}

/// The synchronous three-way admission decision taken under the state lock.
enum Admission<A, T, E> {
  RunNow(A, ResultSender<T, E>),
  Parked,
  Rejected(ResultSender<T, E>),
}

impl<A, T, E> JobQueue<A, T, E>
where
  A: Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  /// Creates a new queue from a concurrency limit, an optional hard limit on
  /// `running + waiting`, and the handler invoked for every admitted job.
  ///
  /// # Errors
  /// Fails synchronously, before any job can be accepted, if `concurrency`
  /// is zero or `limit` is set below 1 or below `concurrency`.
  pub fn new<H, F>(concurrency: usize, limit: Option<usize>, handler: H) -> Result<Self, ConfigError>
  where
    H: Fn(A, CancellationToken) -> F + Send + Sync + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
  {
    if concurrency < 1 {
      return Err(ConfigError::ConcurrencyTooLow);
    }
    if let Some(limit) = limit {
      if limit < 1 {
        return Err(ConfigError::LimitTooLow);
      }
      if limit < concurrency {
        return Err(ConfigError::LimitBelowConcurrency { concurrency, limit });
      }
    }

    let boxed_handler: JobHandler<A, T, E> =
      Arc::new(move |args, token| Box::pin(handler(args, token)) as JobFuture<T, E>);

    let inner = Arc::new(QueueInner {
      concurrency,
      limit,
      handler: boxed_handler,
      state: Mutex::new(QueueState {
        running: 0,
        waiting: VecDeque::new(),
      }),
    });

    // Handles hold this hook rather than the queue itself, so an outstanding
    // handle never keeps the queue alive.
    let weak_inner: Weak<QueueInner<A, T, E>> = Arc::downgrade(&inner);
    let dequeue_hook: DequeueFn = Arc::new(move |job_id| {
      if let Some(inner) = weak_inner.upgrade() {
        inner.reject_waiting(job_id);
      }
    });

    Ok(Self { inner, dequeue_hook })
  }

  /// Submits one job, returning its handle synchronously.
  ///
  /// Admission is decided immediately: start the handler now if a concurrency
  /// slot is free, otherwise park the job FIFO, or reject it with
  /// [`QueueError::QueueFull`] if the hard limit is reached. A rejected
  /// submission mutates no queue state.
  pub fn submit(&self, args: A) -> JobHandle<T, E> {
    let job_id = NEXT_JOB_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let token = CancellationToken::new();
    let (result_tx, result_rx) = oneshot::channel();

    let admission = {
      let mut state = self.inner.state.lock();
      if state.running < self.inner.concurrency {
        state.running += 1;
        Admission::RunNow(args, result_tx)
      } else if self
        .inner
        .limit
        .is_some_and(|limit| state.running + state.waiting.len() >= limit)
      {
        Admission::Rejected(result_tx)
      } else {
        state.waiting.push_back(WaitingJob {
          job_id,
          args,
          result_sender: result_tx,
          token: token.clone(),
        });
        Admission::Parked
      }
    };

    match admission {
      Admission::RunNow(args, result_tx) => {
        debug!(%job_id, "submit: slot free, starting job immediately");
        QueueInner::spawn_job(self.inner.clone(), job_id, args, result_tx, token.clone());
      }
      Admission::Parked => {
        debug!(%job_id, "submit: concurrency limit reached, job parked");
      }
      Admission::Rejected(result_tx) => {
        warn!(%job_id, "submit: queue is at its hard limit, rejecting job");
        let _ = result_tx.send(Err(QueueError::QueueFull));
      }
    }

    JobHandle {
      job_id,
      token,
      result_receiver: result_rx,
      dequeue: self.dequeue_hook.clone(),
    }
  }

  /// Returns `running + waiting` at the instant of the call.
  pub fn count(&self) -> usize {
    let state = self.inner.state.lock();
    state.running + state.waiting.len()
  }

  /// Returns the number of jobs currently running.
  pub fn running_count(&self) -> usize {
    self.inner.state.lock().running
  }

  /// Returns the number of jobs parked in the wait list.
  pub fn waiting_count(&self) -> usize {
    self.inner.state.lock().waiting.len()
  }
}

impl<A, T, E> QueueInner<A, T, E>
where
  A: Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  /// Runs one admitted job on the Tokio runtime: invoke the handler, settle
  /// the caller's channel, then advance the queue by at most one job.
  fn spawn_job(
    inner: Arc<Self>,
    job_id: u64,
    args: A,
    result_sender: ResultSender<T, E>,
    token: CancellationToken,
  ) {
    tokio::spawn(async move {
      trace!(%job_id, "job starting");
      let job_future = (inner.handler)(args, token);

      let outcome: Result<T, QueueError<E>> = match AssertUnwindSafe(job_future).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(handler_error)) => Err(QueueError::Handler(handler_error)),
        Err(_panic_payload) => {
          error!(%job_id, "job handler panicked during execution");
          Err(QueueError::JobPanicked)
        }
      };

      // One settlement frees exactly one slot and claims at most one parked
      // job, so the running count is strictly conserved.
      let next_job = inner.finish_one();

      if result_sender.send(outcome).is_err() {
        warn!(%job_id, "result receiver dropped, job outcome discarded");
      }
      trace!(%job_id, "job settled");

      if let Some(job) = next_job {
        debug!(job_id = %job.job_id, "completion freed a slot, starting next waiting job");
        Self::spawn_job(inner.clone(), job.job_id, job.args, job.result_sender, job.token);
      }
    });
  }

  /// Completion hook bookkeeping: release the finished job's slot and, if
  /// capacity allows, claim the head of the wait list.
  fn finish_one(&self) -> Option<WaitingJob<A, T, E>> {
    let mut state = self.state.lock();
    state.running -= 1;
    if state.running < self.concurrency {
      if let Some(job) = state.waiting.pop_front() {
        state.running += 1;
        return Some(job);
      }
    }
    None
  }

  /// Removes a still-waiting job and settles it with `CancelledBeforeStart`.
  /// No-op if the job has already started or settled.
  fn reject_waiting(&self, job_id: u64) {
    let removed = {
      let mut state = self.state.lock();
      let index = state.waiting.iter().position(|job| job.job_id == job_id);
      index.and_then(|index| state.waiting.remove(index))
    };

    if let Some(job) = removed {
      debug!(%job_id, "cancelled while waiting, removed from wait list");
      let _ = job.result_sender.send(Err(QueueError::CancelledBeforeStart));
    }
  }
}

impl<A, T, E> Drop for JobQueue<A, T, E>
where
  A: Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  fn drop(&mut self) {
    let drained: Vec<WaitingJob<A, T, E>> = {
      let mut state = self.inner.state.lock();
      state.waiting.drain(..).collect()
    };
    if !drained.is_empty() {
      debug!(
        waiting = drained.len(),
        "queue dropped, rejecting still-waiting jobs"
      );
    }
    for job in drained {
      let _ = job.result_sender.send(Err(QueueError::CancelledBeforeStart));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  // Handler that stays pending until its token is cancelled, then errors.
  fn parked_handler(
    _args: u32,
    token: CancellationToken,
  ) -> impl Future<Output = Result<u32, String>> + Send {
    async move {
      token.cancelled().await;
      Err("stopped".to_string())
    }
  }

  #[tokio::test]
  async fn test_admission_counts() {
    let queue = JobQueue::new(2, None, parked_handler).unwrap();

    let _h1 = queue.submit(1);
    let _h2 = queue.submit(2);
    let _h3 = queue.submit(3);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(queue.running_count(), 2);
    assert_eq!(queue.waiting_count(), 1);
    assert_eq!(queue.count(), 3);
  }

  #[tokio::test]
  async fn test_hard_limit_rejects_without_state_change() {
    let queue = JobQueue::new(1, Some(2), parked_handler).unwrap();

    let _h1 = queue.submit(1);
    let _h2 = queue.submit(2);
    assert_eq!(queue.count(), 2);

    let h3 = queue.submit(3);
    assert_eq!(queue.count(), 2, "rejected submission must not be counted");
    assert!(matches!(h3.await_result().await, Err(QueueError::QueueFull)));
  }

  #[tokio::test]
  async fn test_completion_hook_starts_one_waiting_job() {
    let queue = JobQueue::new(1, None, parked_handler).unwrap();

    let h1 = queue.submit(1);
    let _h2 = queue.submit(2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(queue.running_count(), 1);
    assert_eq!(queue.waiting_count(), 1);

    h1.cancel();
    let _ = h1.await_result().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(queue.running_count(), 1, "head of wait list should now occupy the slot");
    assert_eq!(queue.waiting_count(), 0);
  }

  #[tokio::test]
  async fn test_config_validation() {
    let new = |concurrency, limit| {
      JobQueue::<u32, u32, String>::new(concurrency, limit, parked_handler)
    };
    assert_eq!(new(0, None).err(), Some(ConfigError::ConcurrencyTooLow));
    assert_eq!(new(1, Some(0)).err(), Some(ConfigError::LimitTooLow));
    assert_eq!(
      new(3, Some(2)).err(),
      Some(ConfigError::LimitBelowConcurrency { concurrency: 3, limit: 2 })
    );
    assert!(new(2, Some(2)).is_ok());
  }
}
