use crate::error::QueueError;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// The future a handler produces for one job.
/// It must be `Send` and `'static`, and settle with the handler's own
/// `Result<T, E>`.
pub type JobFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

/// The handler a queue invokes for every admitted job.
///
/// The [`CancellationToken`] is the cancellation side of the contract: when a
/// caller cancels a job that is already running, the request is forwarded by
/// cancelling this token. A handler that never observes the token simply runs
/// to its own completion; the caller's handle stays pending until then.
pub type JobHandler<A, T, E> =
  Arc<dyn Fn(A, CancellationToken) -> JobFuture<T, E> + Send + Sync + 'static>;

pub(crate) type ResultSender<T, E> = oneshot::Sender<Result<T, QueueError<E>>>;
pub(crate) type ResultReceiver<T, E> = oneshot::Receiver<Result<T, QueueError<E>>>;

/// A submitted job that has not started yet, parked in FIFO order.
///
/// The token is created at admission time so cancellation registered on the
/// handle works whether the job is still parked or already running.
pub(crate) struct WaitingJob<A, T, E> {
  pub(crate) job_id: u64,
  pub(crate) args: A,
  pub(crate) result_sender: ResultSender<T, E>,
  pub(crate) token: CancellationToken,
}
