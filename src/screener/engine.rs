//! Screening engine applying a rule set across the stock universe.

use crate::models::rule::Rule;
use crate::models::stock::Stock;
use crate::screener::evaluator::RuleEvaluator;

pub struct ScreenerEngine;

impl ScreenerEngine {
    /// Symbols of the stocks matching `rules`, in universe order
    pub fn filter_stocks(stocks: &[Stock], rules: &[Rule]) -> Vec<String> {
        stocks
            .iter()
            .filter(|stock| RuleEvaluator::matches(stock, rules))
            .map(|stock| stock.symbol.clone())
            .collect()
    }
}
