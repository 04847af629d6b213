//! Backend interfaces the screening pipeline is wired against
//!
//! The submission service, result query and worker loop only see these
//! traits; Postgres/Redis and in-memory implementations plug in behind them.

use crate::error::{QueueError, ResultStoreError, TrackerError};
use crate::models::job::{JobStatus, JobTracker};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Persistent job lifecycle records
#[async_trait]
pub trait JobTrackerStore: Send + Sync {
    /// Most recently created tracker of a user
    async fn latest_for_user(&self, user_id: Uuid) -> Result<Option<JobTracker>, TrackerError>;

    async fn get(&self, job_id: Uuid) -> Result<Option<JobTracker>, TrackerError>;

    /// Insert a Pending tracker
    ///
    /// Fails with [`TrackerError::ActiveJobExists`] when the user already has
    /// a Pending or Running job; this check must be atomic with the insert.
    async fn create_pending(&self, tracker: &JobTracker) -> Result<(), TrackerError>;

    /// Move a job from `from` to `to`, touching its update time
    ///
    /// Fails with [`TrackerError::InvalidTransition`] if the job is not
    /// currently in `from`.
    async fn transition(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<JobTracker, TrackerError>;

    /// Mark every job Running since before `older_than` as Failed
    async fn fail_stale_running(&self, older_than: DateTime<Utc>)
        -> Result<Vec<Uuid>, TrackerError>;
}

/// Durable FIFO channel of serialized jobs
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, payload: String) -> Result<(), QueueError>;

    /// Wait for the next payload, `None` once `shutdown` is cancelled
    ///
    /// Each pushed payload is delivered to exactly one caller. Cancellation
    /// is only observed while nothing has been taken off the queue, so a
    /// payload removed from the backend is always returned.
    async fn pop(&self, shutdown: &CancellationToken) -> Result<Option<String>, QueueError>;
}

/// TTL-backed handoff of computed match lists
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store a serialized symbol list under `job_id` with the store's TTL
    async fn put(&self, job_id: Uuid, value: String) -> Result<(), ResultStoreError>;

    /// Serialized symbol list, `None` if never written or expired
    async fn get(&self, job_id: Uuid) -> Result<Option<String>, ResultStoreError>;
}
