use futures_valve::{all, any};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Batch Aggregation Example ---");

  // `all`: run every job with at most 3 in flight, collect results in
  // submission order.
  let urls: Vec<String> = (1..=8).map(|n| format!("https://example.com/item/{}", n)).collect();
  let results = all(3, urls.clone(), |url: String, _token| async move {
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok::<_, String>(format!("fetched {}", url))
  })
  .await;

  match results {
    Ok(values) => {
      info!("all: {} results, in submission order:", values.len());
      for value in values {
        info!("  {}", value);
      }
    }
    Err(e) => info!("all failed: {:?}", e),
  }

  // `any`: first successful job wins, the rest are cancelled.
  let winner = any(3, urls, |url: String, token| async move {
    let delay = 50 + (url.len() as u64 % 5) * 30;
    tokio::select! {
      _ = token.cancelled() => Err(format!("{} cancelled", url)),
      _ = tokio::time::sleep(Duration::from_millis(delay)) => Ok(format!("fetched {}", url)),
    }
  })
  .await;

  info!("any winner: {:?}", winner);

  info!("--- Batch Aggregation Example End ---");
}
