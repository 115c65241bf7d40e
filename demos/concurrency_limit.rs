use futures_valve::{JobQueue, QueueError};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Concurrency Limit & Hard Limit Example ---");

  // One job at a time, at most two jobs admitted overall (running + waiting).
  let queue = JobQueue::new(1, Some(2), |id: usize, _token| async move {
    info!("Job {} running", id);
    tokio::time::sleep(Duration::from_millis(400)).await;
    Ok::<_, String>(id)
  })
  .expect("Queue configuration should be valid");

  let handle_a = queue.submit(1);
  let handle_b = queue.submit(2);
  let handle_c = queue.submit(3);

  info!(
    "Submitted three jobs against limit 2: running={}, waiting={}, count={}",
    queue.running_count(),
    queue.waiting_count(),
    queue.count()
  );

  match handle_c.await_result().await {
    Err(QueueError::QueueFull) => info!("Job 3 was rejected: the queue is at its hard limit"),
    other => info!("Unexpected outcome for job 3: {:?}", other),
  }

  info!("Job 1 result: {:?}", handle_a.await_result().await);
  info!("Job 2 started automatically once job 1 settled");
  info!("Job 2 result: {:?}", handle_b.await_result().await);

  info!("--- Concurrency Limit & Hard Limit Example End ---");
}
