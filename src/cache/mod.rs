//! Redis-backed job queue and result store

pub mod queue;
pub mod results;

pub use queue::RedisJobQueue;
pub use results::RedisResultStore;

use backon::{ExponentialBuilder, Retryable};
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use tracing::warn;

/// Open a Redis client and a managed connection, retrying with backoff
pub async fn connect(redis_url: &str) -> Result<(Client, ConnectionManager), RedisError> {
    let client = Client::open(redis_url)?;
    let manager = (|| ConnectionManager::new(client.clone()))
        .retry(ExponentialBuilder::default().with_max_times(5))
        .notify(|err: &RedisError, dur| {
            warn!(error = %err, retry_in_ms = dur.as_millis(), "Redis connection failed, retrying");
        })
        .await?;
    Ok((client, manager))
}
