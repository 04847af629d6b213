//! Job submission: one active job per user, tracker first, then enqueue

use crate::error::{Result, ScreenerError};
use crate::metrics::Metrics;
use crate::models::job::{JobTracker, ScreenerJob};
use crate::models::rule::Rule;
use crate::services::parse_id;
use crate::services::stores::{JobQueue, JobTrackerStore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct SubmissionService {
    tracker: Arc<dyn JobTrackerStore>,
    queue: Arc<dyn JobQueue>,
    metrics: Option<Arc<Metrics>>,
}

impl SubmissionService {
    pub fn new(tracker: Arc<dyn JobTrackerStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            tracker,
            queue,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Accept a screening request and return its job id
    ///
    /// Returns as soon as the job is enqueued. If the push fails after the
    /// tracker was written, the tracker stays Pending with nothing queued.
    pub async fn submit(&self, user_id: &str, rules: Vec<Rule>) -> Result<Uuid> {
        let user_id = parse_id("user id", user_id)?;

        if let Some(existing) = self.tracker.latest_for_user(user_id).await? {
            if existing.job_status.is_active() {
                debug!(
                    user_id = %user_id,
                    job_id = %existing.job_id,
                    status = %existing.job_status,
                    "Submission rejected: user already has an active job"
                );
                self.record_rejection();
                return Err(ScreenerError::Conflict(user_id));
            }
        }

        let job_id = Uuid::new_v4();
        let job = ScreenerJob {
            job_id,
            rules,
            user_id,
        };
        let payload = serde_json::to_string(&job)
            .map_err(|e| ScreenerError::Internal(format!("failed to serialize job: {}", e)))?;

        let tracker = JobTracker::pending(job_id, user_id);
        if let Err(e) = self.tracker.create_pending(&tracker).await {
            let err = ScreenerError::from(e);
            if matches!(err, ScreenerError::Conflict(_)) {
                self.record_rejection();
            } else {
                error!(user_id = %user_id, error = %err, "Failed to create job tracker");
            }
            return Err(err);
        }

        if let Err(e) = self.queue.push(payload).await {
            warn!(
                job_id = %job_id,
                user_id = %user_id,
                error = %e,
                "Failed to enqueue job; tracker left pending without a queued item"
            );
            return Err(e.into());
        }

        if let Some(ref metrics) = self.metrics {
            metrics.jobs_submitted_total.inc();
        }
        info!(
            job_id = %job_id,
            user_id = %user_id,
            rule_count = job.rules.len(),
            "Screener job enqueued"
        );
        Ok(job_id)
    }

    fn record_rejection(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics.jobs_rejected_total.inc();
        }
    }
}
