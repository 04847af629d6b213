//! Job context for dependency injection

use crate::metrics::Metrics;
use crate::models::stock::Stock;
use crate::services::stores::{JobTrackerStore, ResultStore};
use std::sync::Arc;

/// Everything a job handler needs, passed explicitly to each worker loop
///
/// The stock universe is loaded once and never mutated, so evaluations
/// share it without synchronization.
pub struct JobContext {
    pub tracker: Arc<dyn JobTrackerStore>,
    pub results: Arc<dyn ResultStore>,
    pub stocks: Arc<Vec<Stock>>,
    pub metrics: Option<Arc<Metrics>>,
}

impl JobContext {
    pub fn new(
        tracker: Arc<dyn JobTrackerStore>,
        results: Arc<dyn ResultStore>,
        stocks: Arc<Vec<Stock>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            tracker,
            results,
            stocks,
            metrics,
        }
    }
}
