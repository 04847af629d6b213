//! Error types for the screening pipeline

use crate::models::job::JobStatus;
use thiserror::Error;
use uuid::Uuid;

/// Job tracker persistence failures
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("user {0} already has an active job")]
    ActiveJobExists(Uuid),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {job_id} is not {expected} (cannot move to {next})")]
    InvalidTransition {
        job_id: Uuid,
        expected: JobStatus,
        next: JobStatus,
    },

    #[error("corrupt tracker row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("tracker backend unavailable: {0}")]
    Unavailable(String),
}

/// Job queue failures
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("queue closed")]
    Closed,
}

/// Result store failures
#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("stored result for job {job_id} is not a symbol list: {source}")]
    Corrupt {
        job_id: Uuid,
        source: serde_json::Error,
    },

    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

/// Stock universe loading failures
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to read stock universe file: {0}")]
    Io(#[from] std::io::Error),

    #[error("stock universe file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to query stock universe: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("stock universe entry {index} has no symbol")]
    MissingSymbol { index: usize },
}

/// Service-level errors surfaced to submitters, pollers and the worker loop
#[derive(Debug, Error)]
pub enum ScreenerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("user {0} already has an active screener job")]
    Conflict(Uuid),

    #[error("persistence error: {0}")]
    Persistence(TrackerError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("malformed job payload: {0}")]
    PayloadParse(serde_json::Error),

    #[error("result store error: {0}")]
    ResultStore(#[from] ResultStoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TrackerError> for ScreenerError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::ActiveJobExists(user_id) => ScreenerError::Conflict(user_id),
            other => ScreenerError::Persistence(other),
        }
    }
}

pub type Result<T, E = ScreenerError> = std::result::Result<T, E>;
