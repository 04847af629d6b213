//! Shared data models spanning the screener layers.

pub mod job;
pub mod rule;
pub mod stock;

pub use job::{JobStatus, JobTracker, ScreenerJob};
pub use rule::{Condition, Connector, FilterRule, Operand, RawRule, Rule, RuleError};
pub use stock::Stock;
