//! Postgres persistence: job trackers and the stock universe.

pub mod postgres;
pub mod universe;

pub use postgres::{connect, PostgresJobTracker};
