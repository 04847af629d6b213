//! Postgres job tracker
//!
//! Trackers are keyed by job id so history is kept; a partial unique index
//! on `user_id` over pending/running rows enforces one active job per user
//! even when two submissions race.

use crate::error::TrackerError;
use crate::models::job::{JobStatus, JobTracker};
use crate::services::stores::JobTrackerStore;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

const ACTIVE_JOB_CONSTRAINT: &str = "job_trackers_one_active_per_user";

const TRACKER_COLUMNS: &str = "job_id, user_id, job_status, job_created_at, job_updated_at";

/// Connect to Postgres, retrying with backoff, and spawn the connection task
pub async fn connect(database_url: &str) -> Result<Arc<Client>, tokio_postgres::Error> {
    let (client, connection) = (|| tokio_postgres::connect(database_url, NoTls))
        .retry(ExponentialBuilder::default().with_max_times(5))
        .notify(|err: &tokio_postgres::Error, dur| {
            warn!(error = %err, retry_in_ms = dur.as_millis(), "Postgres connection failed, retrying");
        })
        .await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "Postgres connection error");
        }
    });

    Ok(Arc::new(client))
}

pub struct PostgresJobTracker {
    client: Arc<Client>,
}

impl PostgresJobTracker {
    /// Wrap a connected client and make sure the tracker schema exists
    pub async fn new(client: Arc<Client>) -> Result<Self, TrackerError> {
        let tracker = Self { client };
        tracker.init_schema().await?;
        info!("Job tracker schema ready");
        Ok(tracker)
    }

    async fn init_schema(&self) -> Result<(), TrackerError> {
        self.client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS job_trackers (
                    job_id UUID PRIMARY KEY,
                    user_id UUID NOT NULL,
                    job_status TEXT NOT NULL,
                    job_created_at TIMESTAMPTZ NOT NULL,
                    job_updated_at TIMESTAMPTZ NOT NULL
                );
                CREATE INDEX IF NOT EXISTS job_trackers_user_created_idx
                    ON job_trackers (user_id, job_created_at DESC);
                CREATE UNIQUE INDEX IF NOT EXISTS {}
                    ON job_trackers (user_id)
                    WHERE job_status IN ('pending', 'running');",
                ACTIVE_JOB_CONSTRAINT
            ))
            .await?;
        Ok(())
    }
}

fn tracker_from_row(row: &Row) -> Result<JobTracker, TrackerError> {
    let status: String = row.try_get("job_status")?;
    Ok(JobTracker {
        job_id: row.try_get("job_id")?,
        user_id: row.try_get("user_id")?,
        job_status: status.parse().map_err(TrackerError::Corrupt)?,
        job_created_at: row.try_get("job_created_at")?,
        job_updated_at: row.try_get("job_updated_at")?,
    })
}

#[async_trait]
impl JobTrackerStore for PostgresJobTracker {
    async fn latest_for_user(&self, user_id: Uuid) -> Result<Option<JobTracker>, TrackerError> {
        let row = self
            .client
            .query_opt(
                &format!(
                    "SELECT {} FROM job_trackers
                     WHERE user_id = $1
                     ORDER BY job_created_at DESC
                     LIMIT 1",
                    TRACKER_COLUMNS
                ),
                &[&user_id],
            )
            .await?;
        row.as_ref().map(tracker_from_row).transpose()
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobTracker>, TrackerError> {
        let row = self
            .client
            .query_opt(
                &format!("SELECT {} FROM job_trackers WHERE job_id = $1", TRACKER_COLUMNS),
                &[&job_id],
            )
            .await?;
        row.as_ref().map(tracker_from_row).transpose()
    }

    async fn create_pending(&self, tracker: &JobTracker) -> Result<(), TrackerError> {
        let result = self
            .client
            .execute(
                "INSERT INTO job_trackers (job_id, user_id, job_status, job_created_at, job_updated_at)
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    &tracker.job_id,
                    &tracker.user_id,
                    &JobStatus::Pending.as_str(),
                    &tracker.job_created_at,
                    &tracker.job_updated_at,
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_db_error().and_then(|db| db.constraint())
                    == Some(ACTIVE_JOB_CONSTRAINT) =>
            {
                Err(TrackerError::ActiveJobExists(tracker.user_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn transition(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<JobTracker, TrackerError> {
        if !from.can_transition_to(to) {
            return Err(TrackerError::InvalidTransition {
                job_id,
                expected: from,
                next: to,
            });
        }

        let row = self
            .client
            .query_opt(
                &format!(
                    "UPDATE job_trackers
                     SET job_status = $3, job_updated_at = $4
                     WHERE job_id = $1 AND job_status = $2
                     RETURNING {}",
                    TRACKER_COLUMNS
                ),
                &[&job_id, &from.as_str(), &to.as_str(), &Utc::now()],
            )
            .await?;

        match row {
            Some(row) => tracker_from_row(&row),
            None => match self.get(job_id).await? {
                Some(_) => Err(TrackerError::InvalidTransition {
                    job_id,
                    expected: from,
                    next: to,
                }),
                None => Err(TrackerError::NotFound(job_id)),
            },
        }
    }

    async fn fail_stale_running(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, TrackerError> {
        let rows = self
            .client
            .query(
                "UPDATE job_trackers
                 SET job_status = 'failed', job_updated_at = $2
                 WHERE job_status = 'running' AND job_updated_at < $1
                 RETURNING job_id",
                &[&older_than, &Utc::now()],
            )
            .await?;

        rows.iter()
            .map(|row| row.try_get::<_, Uuid>("job_id").map_err(TrackerError::from))
            .collect()
    }
}
