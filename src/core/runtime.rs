//! Worker loops consuming the screener job queue

use crate::config::parse_var;
use crate::error::{QueueError, ScreenerError};
use crate::jobs::context::JobContext;
use crate::jobs::handlers::{handle_screener_job, JobOutcome};
use crate::services::stores::JobQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration for the worker runtime
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Worker loops per process; one loop keeps results in FIFO order
    pub concurrency: usize,
    /// Seconds between stale job sweeps, 0 disables the sweeper
    pub sweep_interval_seconds: u64,
    /// Running jobs older than this are failed by the sweeper
    pub stale_job_timeout: Duration,
    /// Single BRPOP wait slice for the Redis queue, bounds shutdown latency
    pub queue_poll_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            sweep_interval_seconds: 60,
            stale_job_timeout: Duration::from_secs(900),
            queue_poll_timeout: Duration::from_secs(5),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            concurrency: parse_var::<usize>("WORKER_CONCURRENCY")
                .unwrap_or(defaults.concurrency)
                .max(1),
            sweep_interval_seconds: parse_var("SWEEP_INTERVAL_SECONDS")
                .unwrap_or(defaults.sweep_interval_seconds),
            stale_job_timeout: parse_var("STALE_JOB_TIMEOUT_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_job_timeout),
            queue_poll_timeout: parse_var("QUEUE_POLL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.queue_poll_timeout),
        }
    }
}

/// Screener runtime that spawns the worker loops
pub struct ScreenerRuntime {
    job_context: Arc<JobContext>,
    queue: Arc<dyn JobQueue>,
    concurrency: usize,
}

impl ScreenerRuntime {
    pub fn new(config: &RuntimeConfig, job_context: Arc<JobContext>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            job_context,
            queue,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Set custom concurrency (default comes from the config)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Start all worker loops and return their handles
    ///
    /// Loops stop when `shutdown` is cancelled; a job already being
    /// dequeued or processed finishes first.
    pub fn start_workers(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            concurrency = self.concurrency,
            "ScreenerRuntime: starting {} worker loop(s)",
            self.concurrency
        );

        (0..self.concurrency)
            .map(|index| {
                let name = format!("screener-worker-{}", index);
                let queue = self.queue.clone();
                let job_context = self.job_context.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    run_worker_loop(&name, queue, job_context, shutdown).await;
                })
            })
            .collect()
    }
}

/// Dequeue and process jobs until shutdown
///
/// A failing job never stops the loop.
pub async fn run_worker_loop(
    name: &str,
    queue: Arc<dyn JobQueue>,
    ctx: Arc<JobContext>,
    shutdown: CancellationToken,
) {
    info!(worker = name, "Worker loop started");

    loop {
        // pop yields None once shutdown is cancelled
        let payload = match queue.pop(&shutdown).await {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(QueueError::Closed) => {
                warn!(worker = name, "Job queue closed, stopping worker loop");
                break;
            }
            Err(e) => {
                error!(worker = name, error = %e, "Queue error");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => continue,
                }
            }
        };

        match handle_screener_job(&payload, &ctx).await {
            Ok(JobOutcome::Completed { job_id, matches }) => {
                debug!(worker = name, job_id = %job_id, matches, "Job completed");
            }
            Ok(JobOutcome::Failed { job_id }) => {
                warn!(worker = name, job_id = %job_id, "Job failed");
            }
            Err(ScreenerError::PayloadParse(e)) => {
                warn!(worker = name, error = %e, payload = %payload, "Dropping malformed job payload");
            }
            Err(e) => {
                error!(worker = name, error = %e, "Job processing aborted");
            }
        }
    }

    info!(worker = name, "Worker loop stopped");
}
