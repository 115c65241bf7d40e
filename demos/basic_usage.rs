use futures_valve::{JobHandle, JobQueue};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let queue = JobQueue::new(2, Some(10), |(id, delay_ms): (usize, u64), _token| async move {
    info!("Job {} starting, will sleep for {}ms", id, delay_ms);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    Ok::<_, String>(format!("Job {} finished successfully after {}ms", id, delay_ms))
  })
  .expect("Queue configuration should be valid");

  let mut handles: Vec<JobHandle<String, String>> = Vec::new();

  for i in 0..5 {
    // Alternate sleep times for variety
    let sleep_duration: u64 = 500 + (i as u64 % 3 * 250);
    let handle = queue.submit((i, sleep_duration));
    info!("Submitted job {} with handle id {}", i, handle.id());
    handles.push(handle);
  }

  info!(
    "All jobs submitted. Running: {}, waiting: {}. Awaiting results...",
    queue.running_count(),
    queue.waiting_count()
  );

  for handle in handles {
    let job_id = handle.id();
    match handle.await_result().await {
      Ok(result) => info!("Result for job {}: {}", job_id, result),
      Err(e) => info!("Error for job {}: {:?}", job_id, e),
    }
  }

  info!("All job results processed.");
  info!("--- Basic Usage Example End ---");
}
