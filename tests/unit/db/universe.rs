//! Unit tests for stock universe snapshots

use stockscreener::db::universe::parse_snapshot;
use stockscreener::error::UniverseError;

#[test]
fn parses_snapshot_in_file_order() {
    let stocks = parse_snapshot(
        r#"[
            {"symbol": "MSFT", "indicators": {"rsi": 65.0, "pe": 31}},
            {"symbol": "AAPL", "indicators": {"indicators": {"rsi": 25.0}}},
            {"symbol": "AMZN"}
        ]"#,
    )
    .unwrap();

    let symbols: Vec<&str> = stocks.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["MSFT", "AAPL", "AMZN"]);
    assert_eq!(stocks[0].indicator("pe"), 31.0);
    assert_eq!(stocks[1].indicator("rsi"), 25.0);
    assert!(stocks[2].indicators.is_empty());
}

#[test]
fn entry_without_symbol_is_rejected() {
    let err = parse_snapshot(r#"[{"symbol": "A"}, {"indicators": {}}]"#).unwrap_err();
    assert!(matches!(err, UniverseError::MissingSymbol { index: 1 }), "{:?}", err);
}

#[test]
fn malformed_snapshot_is_rejected() {
    let err = parse_snapshot("{").unwrap_err();
    assert!(matches!(err, UniverseError::Json(_)), "{:?}", err);
}
