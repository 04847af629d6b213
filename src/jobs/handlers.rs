//! Handler for a single dequeued screener job
//!
//! Pending → Running → evaluate → store result → Completed, or Failed when
//! the evaluation or the result write does not succeed. Errors are returned
//! to the worker loop, which logs them and moves on to the next item.

use crate::error::ScreenerError;
use crate::jobs::context::JobContext;
use crate::models::job::{JobStatus, ScreenerJob};
use crate::screener::ScreenerEngine;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Terminal state reached by a processed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { job_id: Uuid, matches: usize },
    Failed { job_id: Uuid },
}

/// Process one raw queue payload
///
/// Returns `PayloadParse` for unparsable payloads and `Persistence` when the
/// tracker cannot be moved to Running; in both cases nothing else happens.
pub async fn handle_screener_job(
    payload: &str,
    ctx: &JobContext,
) -> Result<JobOutcome, ScreenerError> {
    let job: ScreenerJob = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics.jobs_dropped_total.inc();
            }
            return Err(ScreenerError::PayloadParse(e));
        }
    };

    if let Err(e) = ctx
        .tracker
        .transition(job.job_id, JobStatus::Pending, JobStatus::Running)
        .await
    {
        if let Some(ref metrics) = ctx.metrics {
            metrics.jobs_dropped_total.inc();
        }
        return Err(ScreenerError::Persistence(e));
    }

    debug!(
        job_id = %job.job_id,
        user_id = %job.user_id,
        rule_count = job.rules.len(),
        "ScreenerJob: running against {} stocks",
        ctx.stocks.len()
    );

    let start = Instant::now();
    if let Some(ref metrics) = ctx.metrics {
        metrics.jobs_in_flight.inc();
    }

    // CPU-bound pass over the universe; keep it off the async workers
    let stocks = ctx.stocks.clone();
    let rules = job.rules.clone();
    let evaluation =
        tokio::task::spawn_blocking(move || ScreenerEngine::filter_stocks(&stocks, &rules)).await;

    if let Some(ref metrics) = ctx.metrics {
        metrics
            .job_evaluation_duration_seconds
            .observe(start.elapsed().as_secs_f64());
        metrics.jobs_in_flight.dec();
    }

    let matched = match evaluation {
        Ok(matched) => matched,
        Err(e) => {
            error!(job_id = %job.job_id, error = %e, "ScreenerJob: evaluation aborted");
            return Ok(mark_failed(ctx, job.job_id).await);
        }
    };

    let stored = match serde_json::to_string(&matched) {
        Ok(value) => ctx.results.put(job.job_id, value).await.map_err(ScreenerError::from),
        Err(e) => Err(ScreenerError::Internal(format!(
            "failed to serialize result: {}",
            e
        ))),
    };

    if let Err(e) = stored {
        error!(
            job_id = %job.job_id,
            error = %e,
            "ScreenerJob: failed to store result, marking job failed"
        );
        return Ok(mark_failed(ctx, job.job_id).await);
    }

    ctx.tracker
        .transition(job.job_id, JobStatus::Running, JobStatus::Completed)
        .await
        .map_err(ScreenerError::Persistence)?;

    if let Some(ref metrics) = ctx.metrics {
        metrics.jobs_completed_total.inc();
    }
    info!(
        job_id = %job.job_id,
        user_id = %job.user_id,
        matches = matched.len(),
        duration_ms = start.elapsed().as_millis(),
        "ScreenerJob: processed ({} matches)",
        matched.len()
    );

    Ok(JobOutcome::Completed {
        job_id: job.job_id,
        matches: matched.len(),
    })
}

async fn mark_failed(ctx: &JobContext, job_id: Uuid) -> JobOutcome {
    if let Err(e) = ctx
        .tracker
        .transition(job_id, JobStatus::Running, JobStatus::Failed)
        .await
    {
        warn!(job_id = %job_id, error = %e, "ScreenerJob: failed to mark job failed");
    }
    if let Some(ref metrics) = ctx.metrics {
        metrics.jobs_failed_total.inc();
    }
    JobOutcome::Failed { job_id }
}
