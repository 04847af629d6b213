//! Redis list queue: LPUSH on submit, BRPOP in the worker (FIFO)

use crate::config::JOB_QUEUE_KEY;
use crate::error::QueueError;
use crate::services::stores::JobQueue;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, Client};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct RedisJobQueue {
    client: Client,
    conn: ConnectionManager,
    key: String,
    poll_timeout: Duration,
    /// Blocking connections not currently inside a BRPOP
    idle: Mutex<Vec<MultiplexedConnection>>,
}

impl RedisJobQueue {
    pub fn new(client: Client, conn: ConnectionManager) -> Self {
        Self {
            client,
            conn,
            key: JOB_QUEUE_KEY.to_string(),
            poll_timeout: Duration::from_secs(5),
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Server-side BRPOP timeout of a single wait slice
    ///
    /// Also bounds how long a waiting consumer takes to notice shutdown.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout.max(Duration::from_secs(1));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Blocking connections parked between pops
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    async fn checkout(&self) -> Result<MultiplexedConnection, QueueError> {
        let idle = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        match idle {
            Some(conn) => Ok(conn),
            None => {
                debug!(queue = %self.key, "Opening blocking queue connection");
                Ok(self.client.get_multiplexed_async_connection().await?)
            }
        }
    }

    fn checkin(&self, conn: MultiplexedConnection) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn push(&self, payload: String) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.key, payload).await?;
        Ok(())
    }

    /// BRPOP blocks the connection it runs on, so each concurrent consumer
    /// holds its own connection; they are reused across pops. A BRPOP in
    /// flight is never abandoned: shutdown is checked between slices only.
    async fn pop(&self, shutdown: &CancellationToken) -> Result<Option<String>, QueueError> {
        if shutdown.is_cancelled() {
            return Ok(None);
        }

        let mut conn = self.checkout().await?;
        let timeout = self.poll_timeout.as_secs_f64();
        let payload = loop {
            if shutdown.is_cancelled() {
                break None;
            }
            // On error the connection is dropped instead of returned
            let popped: Option<(String, String)> = conn.brpop(&self.key, timeout).await?;
            match popped {
                Some((_, payload)) => break Some(payload),
                None => debug!(queue = %self.key, "Queue empty, waiting"),
            }
        };

        self.checkin(conn);
        Ok(payload)
    }
}
