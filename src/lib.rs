//! Asynchronous stock screening
//!
//! Clients submit ordered filter rules; a worker evaluates them against an
//! in-memory stock universe and hands the matching symbols back through a
//! TTL-bound result store, with a persisted tracker recording each job's
//! lifecycle.

pub mod cache;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod screener;
pub mod services;

pub use error::{Result, ScreenerError};
