//! Screener job and job tracker models

use crate::models::rule::Rule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One asynchronous screening request, serialized onto the queue exactly once
///
/// Wire format: `{"job_id", "rules", "user_id"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerJob {
    pub job_id: Uuid,
    pub rules: Vec<Rule>,
    pub user_id: Uuid,
}

/// Lifecycle state of a job
///
/// `Pending → Running → {Completed, Failed}`; terminal states never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Pending or Running
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Persisted lifecycle record of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTracker {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub job_status: JobStatus,
    pub job_created_at: DateTime<Utc>,
    pub job_updated_at: DateTime<Utc>,
}

impl JobTracker {
    /// Fresh tracker for a job that has just been accepted
    pub fn pending(job_id: Uuid, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            user_id,
            job_status: JobStatus::Pending,
            job_created_at: now,
            job_updated_at: now,
        }
    }
}
