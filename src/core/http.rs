//! HTTP endpoint server using Axum

use axum::{
    extract::{rejection::JsonRejection, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::error::ScreenerError;
use crate::metrics::Metrics;
use crate::models::rule::Rule;
use crate::services::{JobResult, ResultQuery, SubmissionService};

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub submission: Arc<SubmissionService>,
    pub results: Arc<ResultQuery>,
}

/// Error response: status code plus a client-facing message
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ScreenerError> for ApiError {
    fn from(err: ScreenerError) -> Self {
        match err {
            ScreenerError::Validation(message) => ApiError::new(StatusCode::BAD_REQUEST, message),
            ScreenerError::Conflict(_) => ApiError::new(
                StatusCode::CONFLICT,
                "a screener job is already pending or running for this user",
            ),
            other => {
                error!(error = %other, "Request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("invalid request body: {}", rejection.body_text()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Liveness of the API process; backend failures surface per request
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": "stockscreener-api"
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();

    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();

    state.metrics.http_requests_in_flight.dec();
    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct JobResultParams {
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatestJobParams {
    user_id: Option<String>,
}

/// Submit a screener job
async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = body?;
    let job_id = state
        .submission
        .submit(&request.user_id, request.rules)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "jobId": job_id }))))
}

/// Poll the result of a job
async fn get_job_result(
    State(state): State<AppState>,
    Query(params): Query<JobResultParams>,
) -> Result<Response, ApiError> {
    let result = state
        .results
        .get_result(params.job_id.as_deref().unwrap_or_default())
        .await?;

    let response = match result {
        JobResult::Ready {
            job_id,
            status,
            symbols,
        } => (
            StatusCode::OK,
            Json(json!({
                "result": symbols,
                "job_id": job_id,
                "job_status": status,
            })),
        )
            .into_response(),
        JobResult::Processing { job_id, status } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "processing",
                "job_id": job_id,
                "job_status": status,
            })),
        )
            .into_response(),
        JobResult::NotFound => {
            ApiError::new(StatusCode::NOT_FOUND, "result not found").into_response()
        }
    };
    Ok(response)
}

/// Latest job tracker of a user
async fn get_latest_job(
    State(state): State<AppState>,
    Query(params): Query<LatestJobParams>,
) -> Result<Response, ApiError> {
    let tracker = state
        .results
        .latest_job(params.user_id.as_deref().unwrap_or_default())
        .await?;

    Ok(match tracker {
        Some(tracker) => (StatusCode::OK, Json(tracker)).into_response(),
        None => ApiError::new(StatusCode::NOT_FOUND, "no job found for user").into_response(),
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/v1/jobs", post(submit_job).get(get_latest_job))
        .route("/v1/jobs/result", get(get_job_result))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Metrics-only router for the worker process
pub fn create_metrics_router(metrics: Arc<Metrics>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move {
                metrics
                    .export()
                    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
            }
        }),
    )
}

/// Serve the API until `shutdown` is cancelled
pub async fn start_server(
    port: u16,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        port
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
