//! Redis result store: `screener_result:<job_id>` with SET EX

use crate::config::result_key;
use crate::error::ResultStoreError;
use crate::services::stores::ResultStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

pub struct RedisResultStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisResultStore {
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn put(&self, job_id: Uuid, value: String) -> Result<(), ResultStoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(result_key(&job_id), value, self.ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<String>, ResultStoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(result_key(&job_id)).await?;
        Ok(value)
    }
}
