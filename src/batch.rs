use crate::error::QueueError;
use crate::handle::{JobCanceller, JobHandle};
use crate::queue::JobQueue;

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Cancels every tracked job in reverse submission order when dropped.
///
/// Requests against settled jobs are no-ops, so the guard stays armed on the
/// success path too. It is what ties "first failure observed" and "aggregate
/// future dropped by the caller" to the same unwind behavior.
struct CancelFanout {
  cancellers: Vec<JobCanceller>,
}

impl CancelFanout {
  fn new(cancellers: Vec<JobCanceller>) -> Self {
    Self { cancellers }
  }
}

impl Drop for CancelFanout {
  fn drop(&mut self) {
    trace!(jobs = self.cancellers.len(), "fanning out cancellation, last submitted first");
    for canceller in self.cancellers.iter().rev() {
      canceller.cancel();
    }
  }
}

/// Runs every job through one internal [`JobQueue`] and collects all results.
///
/// Results come back in submission order: index `i` of the output is the
/// settlement of job `i` of the input, regardless of completion order. An
/// empty `jobs` resolves with an empty `Vec` without ever invoking the
/// handler.
///
/// The aggregate fails with the error of whichever job fails first; every
/// other job then receives a cancellation request in reverse submission
/// order. Dropping the returned future mid-flight fans out the same
/// cancellation. Invalid configuration is reported through the returned
/// `Result` rather than a panic, before any job is submitted.
pub async fn all<A, T, E, I, H, F>(
  concurrency: usize,
  jobs: I,
  handler: H,
) -> Result<Vec<T>, QueueError<E>>
where
  A: Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
  I: IntoIterator<Item = A>,
  H: Fn(A, CancellationToken) -> F + Send + Sync + 'static,
  F: Future<Output = Result<T, E>> + Send + 'static,
{
  let queue = JobQueue::new(concurrency, None, handler)?;

  let handles: Vec<JobHandle<T, E>> = jobs.into_iter().map(|args| queue.submit(args)).collect();
  if handles.is_empty() {
    return Ok(Vec::new());
  }
  debug!(jobs = handles.len(), concurrency, "batch all: jobs submitted");

  let _fanout = CancelFanout::new(handles.iter().map(JobHandle::canceller).collect());

  let mut results: Vec<Option<T>> = (0..handles.len()).map(|_| None).collect();
  let mut pending: FuturesUnordered<_> = handles
    .into_iter()
    .enumerate()
    .map(|(index, handle)| async move { (index, handle.await_result().await) })
    .collect();

  while let Some((index, outcome)) = pending.next().await {
    match outcome {
      Ok(value) => {
        results[index] = Some(value);
      }
      Err(error) => {
        debug!(job_index = index, "batch all: job failed, unwinding the rest");
        return Err(error);
      }
    }
  }

  // Every job settled exactly once, so every slot is filled.
  results
    .into_iter()
    .collect::<Option<Vec<T>>>()
    .ok_or(QueueError::ResultChannelClosed)
}

/// Runs every job through one internal [`JobQueue`] and resolves with the
/// first successful result.
///
/// On the first success, every other job receives a cancellation request in
/// reverse submission order, whether it is still waiting or already running.
/// An empty `jobs` rejects with [`QueueError::EmptyJobSet`] (deliberately
/// asymmetric with [`all`], which resolves empty input). If every job fails,
/// the aggregate fails with the last error observed in settlement order.
/// Dropping the returned future fans out cancellation the same way.
pub async fn any<A, T, E, I, H, F>(concurrency: usize, jobs: I, handler: H) -> Result<T, QueueError<E>>
where
  A: Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
  I: IntoIterator<Item = A>,
  H: Fn(A, CancellationToken) -> F + Send + Sync + 'static,
  F: Future<Output = Result<T, E>> + Send + 'static,
{
  let jobs: Vec<A> = jobs.into_iter().collect();
  if jobs.is_empty() {
    return Err(QueueError::EmptyJobSet);
  }

  let queue = JobQueue::new(concurrency, None, handler)?;

  let handles: Vec<JobHandle<T, E>> = jobs.into_iter().map(|args| queue.submit(args)).collect();
  debug!(jobs = handles.len(), concurrency, "batch any: jobs submitted");

  let _fanout = CancelFanout::new(handles.iter().map(JobHandle::canceller).collect());

  let mut pending: FuturesUnordered<_> =
    handles.into_iter().map(|handle| handle.await_result()).collect();

  let mut last_error: Option<QueueError<E>> = None;
  while let Some(outcome) = pending.next().await {
    match outcome {
      Ok(value) => {
        debug!("batch any: first success observed, unwinding the rest");
        return Ok(value);
      }
      Err(error) => {
        last_error = Some(error);
      }
    }
  }

  // The job set was non-empty, so at least one error was observed.
  Err(last_error.unwrap_or(QueueError::EmptyJobSet))
}
