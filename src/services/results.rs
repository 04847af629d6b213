//! Result polling: tracker first, then the result store

use crate::error::{Result, ResultStoreError, ScreenerError};
use crate::models::job::{JobStatus, JobTracker};
use crate::services::parse_id;
use crate::services::stores::{JobTrackerStore, ResultStore};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Answer to a result poll
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    /// Job exists and is Pending or Running
    Processing { job_id: Uuid, status: JobStatus },
    /// Unknown job, or terminal job whose result expired or was never written
    NotFound,
    Ready {
        job_id: Uuid,
        status: JobStatus,
        symbols: Vec<String>,
    },
}

pub struct ResultQuery {
    tracker: Arc<dyn JobTrackerStore>,
    results: Arc<dyn ResultStore>,
}

impl ResultQuery {
    pub fn new(tracker: Arc<dyn JobTrackerStore>, results: Arc<dyn ResultStore>) -> Self {
        Self { tracker, results }
    }

    pub async fn get_result(&self, job_id: &str) -> Result<JobResult> {
        let job_id = parse_id("job id", job_id)?;

        let Some(tracker) = self.tracker.get(job_id).await? else {
            debug!(job_id = %job_id, "Result poll for unknown job");
            return Ok(JobResult::NotFound);
        };

        if tracker.job_status.is_active() {
            return Ok(JobResult::Processing {
                job_id,
                status: tracker.job_status,
            });
        }

        let Some(raw) = self.results.get(job_id).await? else {
            debug!(
                job_id = %job_id,
                status = %tracker.job_status,
                "Terminal job has no stored result (expired or never written)"
            );
            return Ok(JobResult::NotFound);
        };

        let symbols: Vec<String> = serde_json::from_str(&raw)
            .map_err(|source| ScreenerError::from(ResultStoreError::Corrupt { job_id, source }))?;

        Ok(JobResult::Ready {
            job_id,
            status: tracker.job_status,
            symbols,
        })
    }

    /// Latest tracker of a user, if they ever submitted a job
    pub async fn latest_job(&self, user_id: &str) -> Result<Option<JobTracker>> {
        let user_id = parse_id("user id", user_id)?;
        Ok(self.tracker.latest_for_user(user_id).await?)
    }
}
