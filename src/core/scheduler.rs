//! Periodic sweeper failing jobs stuck in Running
//!
//! A worker that crashes between storing a result and marking the job
//! terminal leaves the tracker Running forever. The sweeper fails any job
//! that has been Running longer than the configured timeout so pollers get a
//! definitive answer.

use crate::metrics::Metrics;
use crate::services::stores::JobTrackerStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct StaleJobSweeper {
    tracker: Arc<dyn JobTrackerStore>,
    stale_after: Duration,
    interval: Duration,
    metrics: Option<Arc<Metrics>>,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl StaleJobSweeper {
    /// Create a new sweeper
    ///
    /// # Arguments
    /// * `tracker` - Job tracker to sweep
    /// * `interval_seconds` - Sweep interval in seconds (0 = disabled)
    /// * `stale_after` - How long a job may stay Running
    pub fn new(
        tracker: Arc<dyn JobTrackerStore>,
        interval_seconds: u64,
        stale_after: Duration,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if interval_seconds == 0 {
            return Err("Sweeper disabled: interval_seconds is 0".into());
        }

        info!(
            interval = interval_seconds,
            stale_after_secs = stale_after.as_secs(),
            "StaleJobSweeper: created with interval {}s",
            interval_seconds
        );

        Ok(Self {
            tracker,
            stale_after,
            interval: Duration::from_secs(interval_seconds),
            metrics: None,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fail every job Running for longer than `stale_after`
    pub async fn sweep_once(&self) -> Vec<Uuid> {
        sweep(&*self.tracker, self.stale_after, self.metrics.as_deref()).await
    }

    /// Start the sweeper
    ///
    /// The first sweep runs one interval after start, then every interval.
    pub async fn start(&self) {
        let tracker = self.tracker.clone();
        let stale_after = self.stale_after;
        let period = self.interval;
        let metrics = self.metrics.clone();

        let handle = tokio::spawn(async move {
            info!("StaleJobSweeper: started");

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sweep(&*tracker, stale_after, metrics.as_deref()).await;
            }
        });

        let mut h = self.handle.write().await;
        if let Some(previous) = h.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the sweeper
    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(h) = handle.take() {
            h.abort();
            info!("StaleJobSweeper: stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}

async fn sweep(
    tracker: &dyn JobTrackerStore,
    stale_after: Duration,
    metrics: Option<&Metrics>,
) -> Vec<Uuid> {
    let Ok(stale_after) = chrono::Duration::from_std(stale_after) else {
        warn!("StaleJobSweeper: timeout out of range, skipping sweep");
        return Vec::new();
    };
    let cutoff = Utc::now() - stale_after;

    match tracker.fail_stale_running(cutoff).await {
        Ok(failed) if failed.is_empty() => {
            debug!("StaleJobSweeper: no stale jobs");
            failed
        }
        Ok(failed) => {
            warn!(
                count = failed.len(),
                job_ids = ?failed,
                "StaleJobSweeper: failed {} job(s) stuck in running",
                failed.len()
            );
            if let Some(metrics) = metrics {
                metrics.jobs_swept_total.inc_by(failed.len() as u64);
            }
            failed
        }
        Err(e) => {
            error!(error = %e, "StaleJobSweeper: sweep failed");
            Vec::new()
        }
    }
}
