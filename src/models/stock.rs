//! Stock universe snapshot models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A candidate stock with its precomputed indicator values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    #[serde(default)]
    pub indicators: HashMap<String, f64>,
}

impl Stock {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            indicators: HashMap::new(),
        }
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    /// Indicator value, 0 when the stock does not carry it
    pub fn indicator(&self, name: &str) -> f64 {
        self.indicators.get(name).copied().unwrap_or(0.0)
    }

    /// Build a stock from a stored indicators document
    ///
    /// The document is either a flat `{name: value}` object or nests that
    /// object under an `"indicators"` key. Non-numeric entries are dropped.
    pub fn from_indicator_json(symbol: impl Into<String>, document: &Value) -> Self {
        let map = match document.get("indicators") {
            Some(Value::Object(nested)) => Some(nested),
            _ => document.as_object(),
        };

        let indicators = map
            .map(|m| {
                m.iter()
                    .filter_map(|(name, value)| value.as_f64().map(|v| (name.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            symbol: symbol.into(),
            indicators,
        }
    }
}
