//! In-process backends for local runs and tests
//!
//! Semantics match the Postgres/Redis implementations: one active job per
//! user, FIFO single delivery, and results that vanish after their TTL.

use crate::error::{QueueError, ResultStoreError, TrackerError};
use crate::models::job::{JobStatus, JobTracker};
use crate::services::stores::{JobQueue, JobTrackerStore, ResultStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn poisoned<T>(_: T) -> TrackerError {
    TrackerError::Unavailable("tracker lock poisoned".to_string())
}

/// Trackers kept in insertion order
#[derive(Default)]
pub struct InMemoryJobTracker {
    trackers: Mutex<Vec<JobTracker>>,
}

impl InMemoryJobTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobTrackerStore for InMemoryJobTracker {
    async fn latest_for_user(&self, user_id: Uuid) -> Result<Option<JobTracker>, TrackerError> {
        let trackers = self.trackers.lock().map_err(poisoned)?;
        Ok(trackers.iter().rev().find(|t| t.user_id == user_id).cloned())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobTracker>, TrackerError> {
        let trackers = self.trackers.lock().map_err(poisoned)?;
        Ok(trackers.iter().find(|t| t.job_id == job_id).cloned())
    }

    async fn create_pending(&self, tracker: &JobTracker) -> Result<(), TrackerError> {
        let mut trackers = self.trackers.lock().map_err(poisoned)?;
        if trackers
            .iter()
            .any(|t| t.user_id == tracker.user_id && t.job_status.is_active())
        {
            return Err(TrackerError::ActiveJobExists(tracker.user_id));
        }
        trackers.push(tracker.clone());
        Ok(())
    }

    async fn transition(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<JobTracker, TrackerError> {
        let mut trackers = self.trackers.lock().map_err(poisoned)?;
        let tracker = trackers
            .iter_mut()
            .find(|t| t.job_id == job_id)
            .ok_or(TrackerError::NotFound(job_id))?;

        if tracker.job_status != from || !from.can_transition_to(to) {
            return Err(TrackerError::InvalidTransition {
                job_id,
                expected: from,
                next: to,
            });
        }

        tracker.job_status = to;
        tracker.job_updated_at = Utc::now();
        Ok(tracker.clone())
    }

    async fn fail_stale_running(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, TrackerError> {
        let mut trackers = self.trackers.lock().map_err(poisoned)?;
        let now = Utc::now();
        let mut failed = Vec::new();
        for tracker in trackers.iter_mut() {
            if tracker.job_status == JobStatus::Running && tracker.job_updated_at < older_than {
                tracker.job_status = JobStatus::Failed;
                tracker.job_updated_at = now;
                failed.push(tracker.job_id);
            }
        }
        Ok(failed)
    }
}

/// Unbounded FIFO queue shared by every consumer of the same instance
pub struct InMemoryJobQueue {
    sender: mpsc::UnboundedSender<String>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn push(&self, payload: String) -> Result<(), QueueError> {
        self.sender.send(payload).map_err(|_| QueueError::Closed)
    }

    async fn pop(&self, shutdown: &CancellationToken) -> Result<Option<String>, QueueError> {
        let mut receiver = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(None),
            receiver = self.receiver.lock() => receiver,
        };
        // recv is cancel safe: a message is either returned or left queued
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Ok(None),
            payload = receiver.recv() => payload.map(Some).ok_or(QueueError::Closed),
        }
    }
}

/// Result entries with a fixed time-to-live
pub struct InMemoryResultStore {
    entries: Mutex<HashMap<Uuid, (String, Instant)>>,
    ttl: Duration,
}

impl InMemoryResultStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, job_id: Uuid, value: String) -> Result<(), ResultStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ResultStoreError::Unavailable("result lock poisoned".to_string()))?;
        entries.insert(job_id, (value, Instant::now() + self.ttl));
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<String>, ResultStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ResultStoreError::Unavailable("result lock poisoned".to_string()))?;

        let expired = match entries.get(&job_id) {
            Some((_, expires_at)) => Instant::now() >= *expires_at,
            None => return Ok(None),
        };
        if expired {
            entries.remove(&job_id);
            return Ok(None);
        }
        Ok(entries.get(&job_id).map(|(value, _)| value.clone()))
    }
}
