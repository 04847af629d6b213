//! Stock Screener API Server
//!
//! Accepts screener job submissions and serves result polls.
//! This service is stateless and can be horizontally scaled; jobs are
//! evaluated by the separate worker process.

use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Instant;
use stockscreener::cache::{self, RedisJobQueue, RedisResultStore};
use stockscreener::config;
use stockscreener::core::http::{start_server, AppState};
use stockscreener::db::{self, PostgresJobTracker};
use stockscreener::logging;
use stockscreener::metrics::Metrics;
use stockscreener::services::{JobQueue, JobTrackerStore, ResultQuery, ResultStore, SubmissionService};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let port = config::get_port();
    let env = config::get_environment();
    info!("Starting Stock Screener API Server");
    info!(environment = %env, "Environment");
    info!(port = port, "HTTP Server: http://0.0.0.0:{}", port);

    let metrics = Arc::new(Metrics::new()?);

    info!("Initializing Postgres connection...");
    let client = db::connect(&config::get_database_url()).await?;
    let tracker: Arc<dyn JobTrackerStore> = Arc::new(PostgresJobTracker::new(client).await?);
    info!("Postgres connected");

    info!("Initializing Redis connection...");
    let (redis_client, redis_conn) = cache::connect(&config::get_redis_url()).await?;
    let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(redis_client, redis_conn.clone()));
    let results: Arc<dyn ResultStore> =
        Arc::new(RedisResultStore::new(redis_conn, config::get_result_ttl()));
    info!("Redis connected");

    let state = AppState {
        metrics: metrics.clone(),
        start_time: Arc::new(Instant::now()),
        submission: Arc::new(
            SubmissionService::new(tracker.clone(), queue).with_metrics(metrics.clone()),
        ),
        results: Arc::new(ResultQuery::new(tracker, results)),
    };

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let mut server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, state, server_shutdown).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("API server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
            shutdown.cancel();
            let _ = server_handle.await;
            info!("API server stopped");
        }
        _ = &mut server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}
