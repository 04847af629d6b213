//! Job submission, result polling and the backend interfaces they use.

pub mod memory;
pub mod results;
pub mod stores;
pub mod submission;

pub use memory::{InMemoryJobQueue, InMemoryJobTracker, InMemoryResultStore};
pub use results::{JobResult, ResultQuery};
pub use stores::{JobQueue, JobTrackerStore, ResultStore};
pub use submission::SubmissionService;

use crate::error::ScreenerError;
use uuid::Uuid;

pub(crate) fn parse_id(what: &str, raw: &str) -> Result<Uuid, ScreenerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ScreenerError::Validation(format!("{} is required", what)));
    }
    Uuid::parse_str(raw)
        .map_err(|_| ScreenerError::Validation(format!("{} '{}' is not a valid UUID", what, raw)))
}
