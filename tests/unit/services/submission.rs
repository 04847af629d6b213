//! Unit tests for job submission

use async_trait::async_trait;
use std::sync::Arc;
use stockscreener::error::QueueError;
use stockscreener::metrics::Metrics;
use stockscreener::models::job::{JobStatus, ScreenerJob};
use stockscreener::models::rule::{Condition, Rule};
use stockscreener::services::{
    InMemoryJobQueue, InMemoryJobTracker, JobQueue, JobTrackerStore, SubmissionService,
};
use stockscreener::ScreenerError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct ClosedQueue;

#[async_trait]
impl JobQueue for ClosedQueue {
    async fn push(&self, _payload: String) -> Result<(), QueueError> {
        Err(QueueError::Closed)
    }

    async fn pop(&self, _shutdown: &CancellationToken) -> Result<Option<String>, QueueError> {
        Err(QueueError::Closed)
    }
}

fn rules() -> Vec<Rule> {
    vec![Rule::literal("rsi", Condition::LessThan, 30.0)]
}

fn service() -> (SubmissionService, Arc<InMemoryJobTracker>, Arc<InMemoryJobQueue>) {
    let tracker = Arc::new(InMemoryJobTracker::new());
    let queue = Arc::new(InMemoryJobQueue::new());
    let service = SubmissionService::new(tracker.clone(), queue.clone());
    (service, tracker, queue)
}

#[tokio::test]
async fn submit_creates_pending_tracker_and_enqueues_job() {
    let (service, tracker, queue) = service();
    let user_id = Uuid::new_v4();

    let job_id = service.submit(&user_id.to_string(), rules()).await.unwrap();

    let stored = tracker.get(job_id).await.unwrap().expect("tracker created");
    assert_eq!(stored.user_id, user_id);
    assert_eq!(stored.job_status, JobStatus::Pending);

    let payload = queue
        .pop(&CancellationToken::new())
        .await
        .unwrap()
        .expect("job queued");
    let job: ScreenerJob = serde_json::from_str(&payload).unwrap();
    assert_eq!(job.job_id, job_id);
    assert_eq!(job.user_id, user_id);
    assert_eq!(job.rules, rules());
}

#[tokio::test]
async fn second_submission_conflicts_while_pending() {
    let (service, _tracker, _queue) = service();
    let user_id = Uuid::new_v4().to_string();

    service.submit(&user_id, rules()).await.unwrap();
    let err = service.submit(&user_id, rules()).await.unwrap_err();
    assert!(matches!(err, ScreenerError::Conflict(_)), "{:?}", err);
}

#[tokio::test]
async fn second_submission_conflicts_while_running() {
    let (service, tracker, _queue) = service();
    let user_id = Uuid::new_v4().to_string();

    let job_id = service.submit(&user_id, rules()).await.unwrap();
    tracker
        .transition(job_id, JobStatus::Pending, JobStatus::Running)
        .await
        .unwrap();

    let err = service.submit(&user_id, rules()).await.unwrap_err();
    assert!(matches!(err, ScreenerError::Conflict(_)), "{:?}", err);
}

#[tokio::test]
async fn user_may_resubmit_after_terminal_state() {
    let (service, tracker, _queue) = service();
    let user_id = Uuid::new_v4().to_string();

    for terminal in [JobStatus::Completed, JobStatus::Failed] {
        let job_id = service.submit(&user_id, rules()).await.unwrap();
        tracker
            .transition(job_id, JobStatus::Pending, JobStatus::Running)
            .await
            .unwrap();
        tracker
            .transition(job_id, JobStatus::Running, terminal)
            .await
            .unwrap();
    }

    let job_id = service.submit(&user_id, rules()).await.unwrap();
    let latest = tracker
        .latest_for_user(Uuid::parse_str(&user_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.job_id, job_id);
}

#[tokio::test]
async fn different_users_do_not_conflict() {
    let (service, _tracker, _queue) = service();
    service.submit(&Uuid::new_v4().to_string(), rules()).await.unwrap();
    service.submit(&Uuid::new_v4().to_string(), rules()).await.unwrap();
}

#[tokio::test]
async fn invalid_user_id_is_a_validation_error() {
    let (service, _tracker, _queue) = service();

    for raw in ["", "   ", "not-a-uuid"] {
        let err = service.submit(raw, rules()).await.unwrap_err();
        assert!(matches!(err, ScreenerError::Validation(_)), "{:?}", err);
    }
}

#[tokio::test]
async fn queue_failure_leaves_tracker_pending() {
    let tracker = Arc::new(InMemoryJobTracker::new());
    let service = SubmissionService::new(tracker.clone(), Arc::new(ClosedQueue));
    let user_id = Uuid::new_v4();

    let err = service.submit(&user_id.to_string(), rules()).await.unwrap_err();
    assert!(matches!(err, ScreenerError::Queue(_)), "{:?}", err);

    let latest = tracker.latest_for_user(user_id).await.unwrap().unwrap();
    assert_eq!(latest.job_status, JobStatus::Pending);
}

#[tokio::test]
async fn submission_metrics_are_recorded() {
    let tracker = Arc::new(InMemoryJobTracker::new());
    let queue = Arc::new(InMemoryJobQueue::new());
    let metrics = Arc::new(Metrics::new().unwrap());
    let service = SubmissionService::new(tracker, queue).with_metrics(metrics.clone());
    let user_id = Uuid::new_v4().to_string();

    service.submit(&user_id, rules()).await.unwrap();
    let _ = service.submit(&user_id, rules()).await;

    assert_eq!(metrics.jobs_submitted_total.get(), 1);
    assert_eq!(metrics.jobs_rejected_total.get(), 1);
}
