//! Screener job processing

pub mod context;
pub mod handlers;

pub use context::JobContext;
pub use handlers::{handle_screener_job, JobOutcome};
