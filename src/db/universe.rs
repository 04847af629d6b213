//! Stock universe snapshot loading
//!
//! The universe is loaded once at worker startup and shared read-only by
//! every evaluation for the lifetime of the process.

use crate::error::UniverseError;
use crate::models::stock::Stock;
use serde_json::Value;
use std::path::Path;
use tokio_postgres::Client;

/// Load symbols and indicators for the most recent indicator date
pub async fn load_from_postgres(client: &Client) -> Result<Vec<Stock>, UniverseError> {
    let rows = client
        .query(
            "SELECT s.symbol, d.indicators
             FROM stocks s
             JOIN indicators_data d ON s.id = d.stock_id
             WHERE d.date = (SELECT MAX(date) FROM indicators_data)
             ORDER BY s.symbol",
            &[],
        )
        .await?;

    let mut stocks = Vec::with_capacity(rows.len());
    for row in rows {
        let symbol: String = row.try_get(0)?;
        let indicators: Value = row.try_get(1)?;
        stocks.push(Stock::from_indicator_json(symbol, &indicators));
    }
    Ok(stocks)
}

/// Load a JSON snapshot: `[{"symbol": "...", "indicators": {...}}, ...]`
pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<Stock>, UniverseError> {
    let contents = tokio::fs::read_to_string(path).await?;
    parse_snapshot(&contents)
}

pub fn parse_snapshot(contents: &str) -> Result<Vec<Stock>, UniverseError> {
    let entries: Vec<Value> = serde_json::from_str(contents)?;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let symbol = entry
                .get("symbol")
                .and_then(Value::as_str)
                .ok_or(UniverseError::MissingSymbol { index })?;
            Ok(match entry.get("indicators") {
                Some(indicators) => Stock::from_indicator_json(symbol, indicators),
                None => Stock::new(symbol),
            })
        })
        .collect()
}
