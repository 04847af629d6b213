//! Integration tests for the Worker
//!
//! Tests job processing, failure handling, worker loop lifecycle and the
//! stale job sweeper against in-memory backends.


use std::sync::Arc;
use std::time::Duration;
use stockscreener::core::runtime::{run_worker_loop, RuntimeConfig, ScreenerRuntime};
use stockscreener::core::scheduler::StaleJobSweeper;
use stockscreener::jobs::context::JobContext;
use stockscreener::jobs::handlers::{handle_screener_job, JobOutcome};
use stockscreener::models::job::{JobStatus, JobTracker, ScreenerJob};
use stockscreener::models::rule::{Condition, Rule};
use stockscreener::models::stock::Stock;
use stockscreener::services::{
    InMemoryJobTracker, InMemoryResultStore, JobQueue, JobResult, JobTrackerStore, ResultQuery,
    ResultStore,
};
use stockscreener::ScreenerError;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use test_utils::{
    create_test_stocks, oversold_uptrend_rules, FailingResultStore, FlakyTracker, SlicedQueue,
    TestWorker,
};

#[tokio::test]
async fn handler_completes_job_and_stores_matches() {
    let worker = TestWorker::new();
    let job_id = worker
        .submission
        .submit(&Uuid::new_v4().to_string(), oversold_uptrend_rules())
        .await
        .unwrap();
    let payload = worker.next_payload().await;

    let outcome = handle_screener_job(&payload, &worker.job_context).await.unwrap();
    assert_eq!(outcome, JobOutcome::Completed { job_id, matches: 2 });

    let stored = worker.results.get(job_id).await.unwrap().expect("result stored");
    let symbols: Vec<String> = serde_json::from_str(&stored).unwrap();
    assert_eq!(symbols, vec!["AAPL".to_string(), "TSLA".to_string()]);

    let tracker = worker.tracker.get(job_id).await.unwrap().unwrap();
    assert_eq!(tracker.job_status, JobStatus::Completed);
    assert_eq!(worker.metrics.jobs_completed_total.get(), 1);
}

#[tokio::test]
async fn job_with_no_matches_completes_with_empty_result() {
    let worker = TestWorker::new();
    let job_id = worker
        .submission
        .submit(
            &Uuid::new_v4().to_string(),
            vec![Rule::literal("rsi", Condition::GreaterThan, 99.0)],
        )
        .await
        .unwrap();
    let payload = worker.next_payload().await;

    handle_screener_job(&payload, &worker.job_context).await.unwrap();
    assert_eq!(worker.results.get(job_id).await.unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn malformed_payload_is_dropped() {
    let worker = TestWorker::new();

    let err = handle_screener_job("{not json", &worker.job_context)
        .await
        .unwrap_err();
    assert!(matches!(err, ScreenerError::PayloadParse(_)), "{:?}", err);
    assert_eq!(worker.metrics.jobs_dropped_total.get(), 1);
}

#[tokio::test]
async fn result_store_failure_marks_job_failed() {
    let tracker = Arc::new(InMemoryJobTracker::new());
    let results = Arc::new(InMemoryResultStore::new(Duration::from_secs(600)));
    let worker = TestWorker::with_backends(tracker, results, Arc::new(FailingResultStore));

    let job_id = worker
        .submission
        .submit(&Uuid::new_v4().to_string(), oversold_uptrend_rules())
        .await
        .unwrap();
    let payload = worker.next_payload().await;

    let outcome = handle_screener_job(&payload, &worker.job_context).await.unwrap();
    assert_eq!(outcome, JobOutcome::Failed { job_id });

    let tracker = worker.tracker.get(job_id).await.unwrap().unwrap();
    assert_eq!(tracker.job_status, JobStatus::Failed);
    assert_eq!(worker.metrics.jobs_failed_total.get(), 1);

    let query = ResultQuery::new(worker.tracker.clone(), worker.results.clone());
    assert_eq!(
        query.get_result(&job_id.to_string()).await.unwrap(),
        JobResult::NotFound
    );
}

#[tokio::test]
async fn tracker_failure_skips_job_without_result() {
    let inner = Arc::new(InMemoryJobTracker::new());
    let results = Arc::new(InMemoryResultStore::new(Duration::from_secs(600)));
    let ctx = JobContext::new(
        Arc::new(FlakyTracker::new(inner.clone(), 1)),
        results.clone(),
        Arc::new(create_test_stocks()),
        None,
    );

    let job = ScreenerJob {
        job_id: Uuid::new_v4(),
        rules: oversold_uptrend_rules(),
        user_id: Uuid::new_v4(),
    };
    inner
        .create_pending(&JobTracker::pending(job.job_id, job.user_id))
        .await
        .unwrap();

    let payload = serde_json::to_string(&job).unwrap();
    let err = handle_screener_job(&payload, &ctx).await.unwrap_err();
    assert!(matches!(err, ScreenerError::Persistence(_)), "{:?}", err);

    assert!(results.get(job.job_id).await.unwrap().is_none());
    assert_eq!(
        inner.get(job.job_id).await.unwrap().unwrap().job_status,
        JobStatus::Pending
    );
}

#[tokio::test]
async fn payload_for_job_not_pending_is_skipped() {
    let worker = TestWorker::new();
    let job = ScreenerJob {
        job_id: Uuid::new_v4(),
        rules: oversold_uptrend_rules(),
        user_id: Uuid::new_v4(),
    };

    // No tracker exists for this job
    let err = handle_screener_job(&serde_json::to_string(&job).unwrap(), &worker.job_context)
        .await
        .unwrap_err();
    assert!(matches!(err, ScreenerError::Persistence(_)), "{:?}", err);
    assert!(worker.results.get(job.job_id).await.unwrap().is_none());
}

#[tokio::test]
async fn worker_loop_processes_jobs_in_order_and_survives_bad_payloads() {
    let worker = TestWorker::new();
    let shutdown = CancellationToken::new();

    let mut job_ids = Vec::new();
    for _ in 0..3 {
        let job_id = worker
            .submission
            .submit(&Uuid::new_v4().to_string(), oversold_uptrend_rules())
            .await
            .unwrap();
        job_ids.push(job_id);
        worker.push_raw("garbage").await;
    }

    let handle = tokio::spawn(run_worker_loop(
        "test-worker",
        worker.queue.clone(),
        worker.job_context.clone(),
        shutdown.clone(),
    ));

    let mut finished = Vec::new();
    for job_id in &job_ids {
        finished.push(worker.wait_for_terminal(*job_id).await);
    }
    assert!(finished
        .iter()
        .all(|t| t.job_status == JobStatus::Completed));
    assert!(finished
        .windows(2)
        .all(|pair| pair[0].job_updated_at <= pair[1].job_updated_at));

    shutdown.cancel();
    timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker loop stops on shutdown")
        .expect("worker loop does not panic");
    assert_eq!(worker.metrics.jobs_completed_total.get(), 3);
}

#[tokio::test]
async fn runtime_workers_stop_while_waiting_for_jobs() {
    let worker = TestWorker::new();
    let shutdown = CancellationToken::new();

    let runtime = ScreenerRuntime::new(
        &RuntimeConfig::default(),
        worker.job_context.clone(),
        worker.queue.clone(),
    )
    .with_concurrency(3);
    let handles = runtime.start_workers(shutdown.clone());
    assert_eq!(handles.len(), 3);

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();

    for handle in handles {
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("idle worker stops on shutdown")
            .expect("worker loop does not panic");
    }
}

#[tokio::test]
async fn concurrent_workers_deliver_each_job_once() {
    let worker = TestWorker::new();
    let shutdown = CancellationToken::new();

    let runtime = ScreenerRuntime::new(
        &RuntimeConfig::default(),
        worker.job_context.clone(),
        worker.queue.clone(),
    )
    .with_concurrency(4);
    let handles = runtime.start_workers(shutdown.clone());

    let mut job_ids = Vec::new();
    for _ in 0..10 {
        job_ids.push(
            worker
                .submission
                .submit(&Uuid::new_v4().to_string(), oversold_uptrend_rules())
                .await
                .unwrap(),
        );
    }
    for job_id in &job_ids {
        let tracker = worker.wait_for_terminal(*job_id).await;
        assert_eq!(tracker.job_status, JobStatus::Completed);
    }

    shutdown.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    assert_eq!(worker.metrics.jobs_completed_total.get(), 10);
    assert_eq!(worker.metrics.jobs_dropped_total.get(), 0);
}

#[tokio::test]
async fn sweeper_fails_stale_running_jobs() {
    let worker = TestWorker::new();
    let stale = worker
        .submission
        .submit(&Uuid::new_v4().to_string(), oversold_uptrend_rules())
        .await
        .unwrap();
    let pending = worker
        .submission
        .submit(&Uuid::new_v4().to_string(), oversold_uptrend_rules())
        .await
        .unwrap();
    worker
        .tracker
        .transition(stale, JobStatus::Pending, JobStatus::Running)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let sweeper = StaleJobSweeper::new(worker.tracker.clone(), 60, Duration::from_millis(5))
        .unwrap()
        .with_metrics(worker.metrics.clone());
    assert_eq!(sweeper.sweep_once().await, vec![stale]);

    assert_eq!(
        worker.tracker.get(stale).await.unwrap().unwrap().job_status,
        JobStatus::Failed
    );
    assert_eq!(
        worker.tracker.get(pending).await.unwrap().unwrap().job_status,
        JobStatus::Pending
    );
    assert_eq!(worker.metrics.jobs_swept_total.get(), 1);
    assert!(sweeper.sweep_once().await.is_empty());
}

#[tokio::test]
async fn sweeper_leaves_recent_running_jobs() {
    let worker = TestWorker::new();
    let job_id = worker
        .submission
        .submit(&Uuid::new_v4().to_string(), oversold_uptrend_rules())
        .await
        .unwrap();
    worker
        .tracker
        .transition(job_id, JobStatus::Pending, JobStatus::Running)
        .await
        .unwrap();

    let sweeper =
        StaleJobSweeper::new(worker.tracker.clone(), 60, Duration::from_secs(900)).unwrap();
    assert!(sweeper.sweep_once().await.is_empty());
    assert_eq!(
        worker.tracker.get(job_id).await.unwrap().unwrap().job_status,
        JobStatus::Running
    );
}

#[tokio::test]
async fn shutdown_during_dequeue_still_processes_taken_job() {
    let worker = TestWorker::new();
    let queue = Arc::new(SlicedQueue::new(Duration::from_millis(100)));
    let shutdown = CancellationToken::new();

    let job_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    worker
        .tracker
        .create_pending(&JobTracker::pending(job_id, user_id))
        .await
        .unwrap();
    let job = ScreenerJob {
        job_id,
        rules: oversold_uptrend_rules(),
        user_id,
    };
    queue.push(serde_json::to_string(&job).unwrap()).await.unwrap();

    let handle = tokio::spawn(run_worker_loop(
        "test-worker",
        queue.clone(),
        worker.job_context.clone(),
        shutdown.clone(),
    ));

    // Cancel while the loop is inside a wait slice that will yield the job
    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();

    timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker loop stops after the slice")
        .expect("worker loop does not panic");

    assert_eq!(queue.len(), 0);
    let tracker = worker.tracker.get(job_id).await.unwrap().unwrap();
    assert_eq!(tracker.job_status, JobStatus::Completed);
    assert!(worker.results.get(job_id).await.unwrap().is_some());
}

#[tokio::test]
async fn evaluation_does_not_block_the_runtime_thread() {
    let tracker = Arc::new(InMemoryJobTracker::new());
    let results = Arc::new(InMemoryResultStore::new(Duration::from_secs(600)));
    let stocks: Vec<Stock> = (0..200_000)
        .map(|i| Stock::new(format!("S{}", i)).with_indicator("rsi", (i % 100) as f64))
        .collect();
    let ctx = Arc::new(JobContext::new(
        tracker.clone(),
        results.clone(),
        Arc::new(stocks),
        None,
    ));

    let job = ScreenerJob {
        job_id: Uuid::new_v4(),
        rules: vec![Rule::literal("rsi", Condition::LessThan, 10.0)],
        user_id: Uuid::new_v4(),
    };
    tracker
        .create_pending(&JobTracker::pending(job.job_id, job.user_id))
        .await
        .unwrap();
    let payload = serde_json::to_string(&job).unwrap();

    let handler = {
        let ctx = ctx.clone();
        tokio::spawn(async move { handle_screener_job(&payload, &ctx).await })
    };

    // Single-threaded runtime: the handler runs up to the evaluation and
    // parks, handing the thread back
    tokio::task::yield_now().await;
    assert!(!handler.is_finished());
    assert_eq!(
        tracker.get(job.job_id).await.unwrap().unwrap().job_status,
        JobStatus::Running
    );

    let outcome = handler.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Completed {
            job_id: job.job_id,
            matches: 20_000
        }
    );
}
