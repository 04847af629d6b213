//! Rule evaluation against a single stock
//!
//! Filter results and connectors are folded strictly left to right with no
//! precedence or grouping: `A AND B OR C` is `(A AND B) OR C`, and
//! `A OR B AND C` is `(A OR B) AND C`. Screeners are authored against this
//! order, so it must not change.

use crate::models::rule::{Condition, Connector, FilterRule, Operand, Rule};
use crate::models::stock::Stock;

pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Whether `stock` satisfies the ordered rule sequence
    ///
    /// A rule set without any filter never matches. Connectors beyond the
    /// number of filters minus one are ignored.
    pub fn matches(stock: &Stock, rules: &[Rule]) -> bool {
        let mut truths = Vec::new();
        let mut connectors = Vec::new();

        for rule in rules {
            match rule {
                Rule::Filter(filter) => truths.push(Self::evaluate_filter(stock, filter)),
                Rule::Connector(connector) => connectors.push(connector),
            }
        }

        let Some((&first, rest)) = truths.split_first() else {
            return false;
        };

        connectors
            .into_iter()
            .zip(rest.iter().copied())
            .fold(first, |result, (connector, next)| match connector {
                Connector::And => result && next,
                Connector::Or => result || next,
                Connector::Unknown(_) => result,
            })
    }

    fn evaluate_filter(stock: &Stock, filter: &FilterRule) -> bool {
        let value = stock.indicator(&filter.indicator);
        let operand = match &filter.operand {
            Operand::Indicator(name) => stock.indicator(name),
            Operand::Literal(literal) => *literal,
        };
        Self::compare_value(value, &filter.condition, operand)
    }

    /// Compare a value using the specified condition
    fn compare_value(value: f64, condition: &Condition, operand: f64) -> bool {
        match condition {
            Condition::GreaterThan => value > operand,
            Condition::LessThan => value < operand,
            Condition::EqualTo => value == operand,
            Condition::Unknown(_) => false,
        }
    }
}
