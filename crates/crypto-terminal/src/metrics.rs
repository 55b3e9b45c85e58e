//! Key metric extraction
//!
//! Metrics come from two places: the `key_metrics` object in the model's
//! answer, and the raw tool results. Both are mapped onto the same named
//! fields of [`KeyMetrics`]; labels are matched loosely (`marketCap`,
//! `market_cap` and "Market Cap" are the same field).

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Map, Value};

use crate::model::{GatheredData, KeyMetrics};

const SYMBOL_KEYS: [&str; 2] = ["symbol", "ticker"];
const DATE_KEYS: [&str; 3] = ["date", "time", "timestamp"];
const CANDLE_KEYS: [&str; 4] = ["open", "high", "low", "close"];

/// Canonical field for a metric label, if it names one
pub fn canonical_field(label: &str) -> Option<&'static str> {
    let key: String = label
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let field = match key.as_str() {
        "price" | "currentprice" | "priceusd" | "lastprice" => "price",
        "change24h" | "percentchange24h" | "pricechange24h" | "24hchange" | "change24hpercent" => "change_24h",
        "volume24h" | "24hvolume" | "volume" | "tradingvolume" => "volume_24h",
        "marketcap" | "mcap" => "market_cap",
        "galaxyscore" => "galaxy_score",
        "altrank" => "alt_rank",
        "socialdominance" => "social_dominance",
        "sentiment" | "sentimentscore" => "sentiment",
        "interactions24h" | "interactions" | "socialinteractions" => "interactions_24h",
        _ => return None,
    };
    Some(field)
}

/// Parse "$1,234.5", "12%", "+3.1", "1.2B" and plain numbers
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(['*', '_'])
        .trim_end_matches(['*', '_'])
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | '+' | ' '))
        .collect();

    let (number, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], dec!(1000)),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], dec!(1000000)),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], dec!(1000000000)),
        't' | 'T' => (&cleaned[..cleaned.len() - 1], dec!(1000000000000)),
        _ => (cleaned.as_str(), Decimal::ONE),
    };

    let value = Decimal::from_str(number)
        .or_else(|_| Decimal::from_scientific(number))
        .ok()?;
    value.checked_mul(multiplier)
}

/// Decimal from a JSON number or numeric string
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Map the model's `key_metrics` object.
///
/// Known labels with numeric values fill the named fields; other numbers and
/// strings are kept under their own names in `extra`.
pub fn metrics_from_object(object: &Map<String, Value>) -> KeyMetrics {
    let mut metrics = KeyMetrics::default();

    for (key, value) in object {
        let parsed = canonical_field(key).zip(decimal_from_value(value));
        match (parsed, value) {
            (Some((field, number)), _) => {
                metrics.set(field, number);
            }
            (None, Value::Number(_) | Value::String(_)) => {
                metrics.extra.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }

    metrics
}

/// Pull metrics for `gathered.symbol` out of the raw tool results.
///
/// Objects tagged with another symbol are skipped, as are time-series
/// candles; the first value found for a field wins.
pub fn metrics_from_gathered(gathered: &GatheredData) -> KeyMetrics {
    let mut metrics = KeyMetrics::default();

    for value in gathered.successes().filter_map(|r| r.result()) {
        collect(value, &gathered.symbol, &mut metrics);
    }

    metrics
}

fn collect(value: &Value, symbol: &str, metrics: &mut KeyMetrics) {
    match value {
        Value::Object(object) => {
            if !belongs_to(object, symbol) || is_candle(object) {
                return;
            }
            for (key, value) in object {
                if let Some(field) = canonical_field(key) {
                    if !metrics.has(field) {
                        if let Some(number) = decimal_from_value(value) {
                            metrics.set(field, number);
                        }
                    }
                }
            }
            for value in object.values() {
                collect(value, symbol, metrics);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, symbol, metrics);
            }
        }
        Value::String(text) => {
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                if let Ok(inner) = serde_json::from_str::<Value>(trimmed) {
                    collect(&inner, symbol, metrics);
                    return;
                }
            }
            collect_labels(text, metrics);
        }
        _ => {}
    }
}

/// "Label: value" lines in tool text output
fn collect_labels(text: &str, metrics: &mut KeyMetrics) {
    for line in text.lines() {
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(field) = canonical_field(label) else {
            continue;
        };
        if metrics.has(field) {
            continue;
        }
        if let Some(number) = rest.split_whitespace().next().and_then(parse_decimal) {
            metrics.set(field, number);
        }
    }
}

fn belongs_to(object: &Map<String, Value>, symbol: &str) -> bool {
    SYMBOL_KEYS
        .iter()
        .find_map(|k| object.get(*k).and_then(Value::as_str))
        .is_none_or(|tagged| tagged.eq_ignore_ascii_case(symbol))
}

fn is_candle(object: &Map<String, Value>) -> bool {
    DATE_KEYS.iter().any(|k| object.contains_key(*k))
        && CANDLE_KEYS.iter().any(|k| object.contains_key(*k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use terminal_core::{ToolCall, ToolResult};

    fn gathered(results: Vec<Value>) -> GatheredData {
        let mut data = GatheredData::new("SOL");
        for (i, result) in results.into_iter().enumerate() {
            data.tool_results
                .push(ToolResult::success(ToolCall::new(format!("tool{i}")), result));
        }
        data
    }

    #[test]
    fn test_parse_decimal_formats() {
        assert_eq!(parse_decimal("$1,234.50"), Some(dec!(1234.50)));
        assert_eq!(parse_decimal("-3.2%"), Some(dec!(-3.2)));
        assert_eq!(parse_decimal("+7"), Some(dec!(7)));
        assert_eq!(parse_decimal("1.5B"), Some(dec!(1500000000)));
        assert_eq!(parse_decimal("**72**"), Some(dec!(72)));
        assert_eq!(parse_decimal("2.5e3"), Some(dec!(2500)));
        assert_eq!(parse_decimal("n/a"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("$"), None);
    }

    #[test]
    fn test_canonical_field_aliases() {
        assert_eq!(canonical_field("marketCap"), Some("market_cap"));
        assert_eq!(canonical_field("Market Cap"), Some("market_cap"));
        assert_eq!(canonical_field("percent_change_24h"), Some("change_24h"));
        assert_eq!(canonical_field("**Galaxy Score**"), Some("galaxy_score"));
        assert_eq!(canonical_field("topic"), None);
    }

    #[test]
    fn test_metrics_from_model_object() {
        let object = json!({
            "price": "$142.10",
            "galaxy_score": 68,
            "sentiment": "bullish",
            "trend": "up",
            "nested": {"ignored": true}
        });

        let metrics = metrics_from_object(object.as_object().unwrap());
        assert_eq!(metrics.price, Some(dec!(142.10)));
        assert_eq!(metrics.galaxy_score, Some(dec!(68)));
        assert_eq!(metrics.sentiment, None);
        assert_eq!(metrics.extra["sentiment"], "bullish");
        assert_eq!(metrics.extra["trend"], "up");
        assert!(!metrics.extra.contains_key("nested"));
    }

    #[test]
    fn test_gathered_json_filters_other_symbols() {
        let data = gathered(vec![json!({"data": [
            {"symbol": "BTC", "price": 64000, "market_cap": 1.2e12},
            {"symbol": "SOL", "price": 142.5, "market_cap": 65000000000_u64, "galaxy_score": 71}
        ]})]);

        let metrics = metrics_from_gathered(&data);
        assert_eq!(metrics.price, Some(dec!(142.5)));
        assert_eq!(metrics.market_cap, Some(dec!(65000000000)));
        assert_eq!(metrics.galaxy_score, Some(dec!(71)));
    }

    #[test]
    fn test_gathered_text_labels_and_candles() {
        let data = gathered(vec![
            json!({"content": [{"type": "text", "text": "# Solana (SOL)\nPrice: $141.90\nAltRank: 12\n24h Volume: 3.2B\nSummary: strong week"}]}),
            json!([{"time": 1704067200, "close": 90}, {"time": 1704153600, "close": 95}]),
        ]);

        let metrics = metrics_from_gathered(&data);
        assert_eq!(metrics.price, Some(dec!(141.90)));
        assert_eq!(metrics.alt_rank, Some(dec!(12)));
        assert_eq!(metrics.volume_24h, Some(dec!(3200000000)));
    }

    #[test]
    fn test_failed_results_contribute_nothing() {
        let mut data = GatheredData::new("SOL");
        data.tool_results
            .push(ToolResult::failure(ToolCall::new("Topic"), "Price: 1"));
        assert!(metrics_from_gathered(&data).is_empty());
    }
}
