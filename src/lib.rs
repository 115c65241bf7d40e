//! A Tokio-based bounded-concurrency job queue with FIFO admission control,
//! cooperative cancellation, and all/any batch aggregation.

mod batch;
mod error;
mod handle;
mod job;
mod queue;

pub use batch::{all, any};
pub use error::{ConfigError, QueueError};
pub use handle::{JobCanceller, JobHandle};
pub use job::{JobFuture, JobHandler};
pub use queue::JobQueue;
