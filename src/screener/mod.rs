//! Rule evaluation over the in-memory stock universe.

pub mod engine;
pub mod evaluator;

pub use engine::ScreenerEngine;
pub use evaluator::RuleEvaluator;
