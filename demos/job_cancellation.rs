use futures_valve::{JobQueue, QueueError};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Job Cancellation Example ---");

  // A cooperative handler: it races its work against the cancellation token
  // it was handed at invocation time.
  let queue = JobQueue::new(1, None, |id: usize, token| async move {
    tokio::select! {
      _ = token.cancelled() => {
        info!("Job {} observed its cancellation token", id);
        Err(format!("job {} cancelled", id))
      }
      _ = tokio::time::sleep(Duration::from_secs(3)) => Ok(id),
    }
  })
  .expect("Queue configuration should be valid");

  let running = queue.submit(1);
  let waiting = queue.submit(2);
  tokio::time::sleep(Duration::from_millis(100)).await;

  // Job 2 never started: it is removed from the wait list and the handler is
  // never invoked for it.
  waiting.cancel();
  match waiting.await_result().await {
    Err(QueueError::CancelledBeforeStart) => info!("Job 2 cancelled before it started"),
    other => info!("Unexpected outcome for job 2: {:?}", other),
  }

  // Job 1 is in flight: the request is forwarded to the handler's token and
  // the handler decides how to settle.
  running.cancel();
  match running.await_result().await {
    Err(QueueError::Handler(message)) => info!("Job 1 settled by its own logic: {}", message),
    other => info!("Unexpected outcome for job 1: {:?}", other),
  }

  info!("--- Job Cancellation Example End ---");
}
