//! Screener rule data models
//!
//! Rules travel over the wire in the client's loose JSON shape
//! (`RawRule`) and are resolved once into the typed [`Rule`] enum. After
//! parsing, comparison operands are either an indicator reference or a
//! finite number, so evaluation never deals with runtime type checks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A single entry of a screener's ordered rule sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub enum Rule {
    Filter(FilterRule),
    Connector(Connector),
}

impl Rule {
    /// Filter rule comparing an indicator against a literal number
    pub fn literal(indicator: impl Into<String>, condition: Condition, value: f64) -> Self {
        Rule::Filter(FilterRule {
            indicator: indicator.into(),
            condition,
            operand: Operand::Literal(value),
        })
    }

    /// Filter rule comparing two indicators of the same stock
    pub fn indicator(
        indicator: impl Into<String>,
        condition: Condition,
        other: impl Into<String>,
    ) -> Self {
        Rule::Filter(FilterRule {
            indicator: indicator.into(),
            condition,
            operand: Operand::Indicator(other.into()),
        })
    }

    pub fn and() -> Self {
        Rule::Connector(Connector::And)
    }

    pub fn or() -> Self {
        Rule::Connector(Connector::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRule {
    pub indicator: String,
    pub condition: Condition,
    pub operand: Operand,
}

/// Right-hand side of a filter comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Indicator(String),
    Literal(f64),
}

/// Comparison applied by a filter rule
///
/// Unrecognized conditions are preserved so they can be echoed back and
/// always evaluate to `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    GreaterThan,
    LessThan,
    EqualTo,
    Unknown(String),
}

impl Condition {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "greater_than" => Condition::GreaterThan,
            "less_than" => Condition::LessThan,
            "equal_to" => Condition::EqualTo,
            other => Condition::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Condition::GreaterThan => "greater_than",
            Condition::LessThan => "less_than",
            Condition::EqualTo => "equal_to",
            Condition::Unknown(raw) => raw,
        }
    }
}

/// Logical connector joining the running result with the next filter
///
/// Unrecognized connectors are a no-op during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
    Unknown(String),
}

impl Connector {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "AND" => Connector::And,
            "OR" => Connector::Or,
            other => Connector::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
            Connector::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("unknown rule type '{0}' (expected 'filter' or 'condition')")]
    UnknownType(String),
    #[error("unknown comparison type '{0}' (expected 'indicator' or 'number')")]
    UnknownComparisonType(String),
    #[error("filter rule on '{0}' is missing comparisonType")]
    MissingComparisonType(String),
    #[error("comparison value {0} is not a finite number")]
    InvalidLiteral(String),
    #[error("comparison value {0} is not an indicator name")]
    InvalidIndicatorRef(String),
}

/// Client wire shape of a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_value: Option<Value>,
    #[serde(default)]
    pub technical_indicator: String,
}

impl TryFrom<RawRule> for Rule {
    type Error = RuleError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        match raw.rule_type.as_str() {
            "condition" => Ok(Rule::Connector(Connector::parse(&raw.condition))),
            "filter" => {
                let comparison_type = raw
                    .comparison_type
                    .ok_or_else(|| RuleError::MissingComparisonType(raw.technical_indicator.clone()))?;
                let operand = match comparison_type.as_str() {
                    "number" => Operand::Literal(parse_literal(raw.comparison_value.as_ref())?),
                    "indicator" => match raw.comparison_value {
                        Some(Value::String(name)) => Operand::Indicator(name),
                        None | Some(Value::Null) => Operand::Indicator(String::new()),
                        Some(other) => return Err(RuleError::InvalidIndicatorRef(other.to_string())),
                    },
                    other => return Err(RuleError::UnknownComparisonType(other.to_string())),
                };
                Ok(Rule::Filter(FilterRule {
                    indicator: raw.technical_indicator,
                    condition: Condition::parse(&raw.condition),
                    operand,
                }))
            }
            other => Err(RuleError::UnknownType(other.to_string())),
        }
    }
}

/// A missing literal reads as 0, like a missing indicator does.
fn parse_literal(value: Option<&Value>) -> Result<f64, RuleError> {
    let parsed = match value {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RuleError::InvalidLiteral(
            value.map(Value::to_string).unwrap_or_default(),
        )),
    }
}

impl From<Rule> for RawRule {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::Connector(connector) => RawRule {
                rule_type: "condition".to_string(),
                condition: connector.as_str().to_string(),
                comparison_type: None,
                comparison_value: None,
                technical_indicator: String::new(),
            },
            Rule::Filter(filter) => {
                let (comparison_type, comparison_value) = match filter.operand {
                    Operand::Indicator(name) => ("indicator", Value::String(name)),
                    Operand::Literal(value) => ("number", Value::from(value)),
                };
                RawRule {
                    rule_type: "filter".to_string(),
                    condition: filter.condition.as_str().to_string(),
                    comparison_type: Some(comparison_type.to_string()),
                    comparison_value: Some(comparison_value),
                    technical_indicator: filter.indicator,
                }
            }
        }
    }
}
