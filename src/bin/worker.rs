//! Stock Screener Worker
//!
//! Processes screener jobs from the Redis queue against the stock universe
//! loaded at startup. Can be run as several processes over the same queue.

use dotenvy::dotenv;
use std::sync::Arc;
use stockscreener::cache::{self, RedisJobQueue, RedisResultStore};
use stockscreener::config;
use stockscreener::core::http::create_metrics_router;
use stockscreener::core::runtime::{RuntimeConfig, ScreenerRuntime};
use stockscreener::core::scheduler::StaleJobSweeper;
use stockscreener::db::{self, universe, PostgresJobTracker};
use stockscreener::jobs::context::JobContext;
use stockscreener::logging;
use stockscreener::metrics::Metrics;
use stockscreener::services::{JobQueue, JobTrackerStore, ResultStore};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let runtime_config = RuntimeConfig::from_env();
    let env = config::get_environment();
    info!("Starting Stock Screener Worker");
    info!(environment = %env, "Environment");
    info!(
        concurrency = runtime_config.concurrency,
        "Worker concurrency: {}", runtime_config.concurrency
    );

    let metrics = Arc::new(Metrics::new()?);

    info!("Initializing Postgres connection...");
    let client = db::connect(&config::get_database_url()).await?;
    let tracker: Arc<dyn JobTrackerStore> =
        Arc::new(PostgresJobTracker::new(client.clone()).await?);
    info!("Postgres connected");

    // Loaded once; never refreshed while the process runs
    let stocks = match config::get_stock_universe_path() {
        Some(path) => {
            info!(path = %path, "Loading stock universe from file...");
            universe::load_from_file(&path).await?
        }
        None => {
            info!("Loading stock universe from database...");
            universe::load_from_postgres(&client).await?
        }
    };
    if stocks.is_empty() {
        warn!("Stock universe is empty - every job will complete with no matches");
    } else {
        info!(stock_count = stocks.len(), "Loaded {} stocks", stocks.len());
    }
    metrics.stock_universe_size.set(stocks.len() as f64);

    info!("Initializing Redis connection...");
    let (redis_client, redis_conn) = cache::connect(&config::get_redis_url()).await?;
    let queue: Arc<dyn JobQueue> = Arc::new(
        RedisJobQueue::new(redis_client, redis_conn.clone())
            .with_poll_timeout(runtime_config.queue_poll_timeout),
    );
    let results: Arc<dyn ResultStore> =
        Arc::new(RedisResultStore::new(redis_conn, config::get_result_ttl()));
    info!("Redis connected");

    let job_context = Arc::new(JobContext::new(
        tracker.clone(),
        results,
        Arc::new(stocks),
        Some(metrics.clone()),
    ));

    let shutdown = CancellationToken::new();

    if let Some(port) = config::parse_var::<u16>("WORKER_METRICS_PORT") {
        let router = create_metrics_router(metrics.clone());
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        let metrics_shutdown = shutdown.clone();
        info!(port = port, "Worker metrics available at http://0.0.0.0:{}/metrics", port);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(metrics_shutdown.cancelled_owned())
                .await
            {
                error!(error = %e, "Metrics server error");
            }
        });
    }

    let runtime = ScreenerRuntime::new(&runtime_config, job_context, queue);
    let worker_handles = runtime.start_workers(shutdown.clone());

    let sweeper = if runtime_config.sweep_interval_seconds > 0 {
        let sweeper = StaleJobSweeper::new(
            tracker,
            runtime_config.sweep_interval_seconds,
            runtime_config.stale_job_timeout,
        )
        .map_err(|e| format!("Failed to create sweeper: {}", e))?
        .with_metrics(metrics.clone());
        sweeper.start().await;
        Some(sweeper)
    } else {
        warn!("Stale job sweeper disabled (SWEEP_INTERVAL_SECONDS=0)");
        None
    };

    info!("Worker started, waiting for shutdown signal...");
    signal::ctrl_c().await?;

    info!("Shutting down worker...");
    shutdown.cancel();
    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }
    for handle in worker_handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Worker loop panicked");
        }
    }
    info!("Worker stopped");

    Ok(())
}
