//! Chart series normalization

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::metrics::decimal_from_value;
use crate::model::{ChartPoint, GatheredData};

/// Most points a chart carries
pub const MAX_CHART_POINTS: usize = 20;

/// Numeric timestamps above this are milliseconds
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

const DATE_KEYS: [&str; 4] = ["date", "time", "timestamp", "datetime"];
const PRICE_KEYS: [&str; 3] = ["price", "close", "value"];

/// Clean a raw series for display.
///
/// Drops points without a date or with a non-positive price, sorts them
/// chronologically (unparsable dates last, in their original order), keeps
/// the first point per date, then decimates to [`MAX_CHART_POINTS`].
/// Applying it twice changes nothing.
pub fn normalize(points: Vec<ChartPoint>) -> Vec<ChartPoint> {
    let mut keyed: Vec<(Option<DateTime<Utc>>, ChartPoint)> = points
        .into_iter()
        .filter(|p| p.price > Decimal::ZERO)
        .filter_map(|p| {
            let token = p.date.trim();
            if token.is_empty() {
                return None;
            }
            let (key, date) = match numeric_timestamp(token) {
                Some(at) => (Some(at), at.to_rfc3339_opts(SecondsFormat::Secs, true)),
                None => (parse_date(token), token.to_string()),
            };
            Some((key, ChartPoint::new(date, p.price)))
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut seen = HashSet::new();
    let deduped = keyed
        .into_iter()
        .map(|(_, point)| point)
        .filter(|point| seen.insert(point.date.clone()))
        .collect();

    decimate(deduped, MAX_CHART_POINTS)
}

/// Keep indices `0, step, 2*step, ...` with `step = ceil(len / max)`
pub fn decimate(points: Vec<ChartPoint>, max: usize) -> Vec<ChartPoint> {
    if max == 0 || points.len() <= max {
        return points;
    }
    let step = points.len().div_ceil(max);
    points.into_iter().step_by(step).collect()
}

/// Read a series out of a JSON array.
///
/// Entries are `{date|time|timestamp, price|close|value}` objects or
/// `[date, price]` pairs; anything else is skipped.
pub fn points_from_value(value: &Value) -> Vec<ChartPoint> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries.iter().filter_map(point_from_entry).collect()
}

/// Price series found in the gathered tool results, if any.
///
/// Used when the model supplies no usable chart; nothing is invented when
/// the tools returned no time series.
pub fn series_from_gathered(gathered: &GatheredData) -> Vec<ChartPoint> {
    gathered
        .successes()
        .filter_map(|r| r.result())
        .find_map(find_series)
        .unwrap_or_default()
}

fn find_series(value: &Value) -> Option<Vec<ChartPoint>> {
    match value {
        Value::Array(items) => {
            let looks_like_series = items.len() >= 2
                && items.iter().take(3).all(|item| {
                    item.as_object().is_some_and(|obj| {
                        DATE_KEYS.iter().any(|k| obj.contains_key(*k))
                            && PRICE_KEYS.iter().any(|k| obj.contains_key(*k))
                    })
                });
            if looks_like_series {
                let points = normalize(points_from_value(value));
                if points.len() >= 2 {
                    return Some(points);
                }
            }
            items.iter().find_map(find_series)
        }
        Value::Object(obj) => obj.values().find_map(find_series),
        // Tool text content often carries JSON
        Value::String(text) => {
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                serde_json::from_str::<Value>(trimmed)
                    .ok()
                    .and_then(|inner| find_series(&inner))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn point_from_entry(entry: &Value) -> Option<ChartPoint> {
    let (date, price) = match entry {
        Value::Object(obj) => (
            DATE_KEYS.iter().find_map(|k| obj.get(*k))?,
            PRICE_KEYS.iter().find_map(|k| obj.get(*k))?,
        ),
        Value::Array(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
        _ => return None,
    };

    let date = match date {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(ChartPoint::new(date, decimal_from_value(price)?))
}

fn numeric_timestamp(token: &str) -> Option<DateTime<Utc>> {
    let raw: i64 = token.parse().ok()?;
    if raw.abs() >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

fn parse_date(token: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(token) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(token, format) {
            return Some(at.and_utc());
        }
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use terminal_core::{ToolCall, ToolResult};

    fn point(date: &str, price: Decimal) -> ChartPoint {
        ChartPoint::new(date, price)
    }

    fn dates(points: &[ChartPoint]) -> Vec<&str> {
        points.iter().map(|p| p.date.as_str()).collect()
    }

    #[test]
    fn test_sorts_and_drops_invalid_points() {
        let points = vec![
            point("2024-03-03", dec!(3)),
            point("", dec!(9)),
            point("2024-03-01", dec!(1)),
            point("2024-03-02", dec!(0)),
            point("2024-03-02 12:00:00", dec!(2)),
            point("2024-03-04", dec!(-4)),
        ];

        let normalized = normalize(points);
        assert_eq!(dates(&normalized), ["2024-03-01", "2024-03-02 12:00:00", "2024-03-03"]);
    }

    #[test]
    fn test_unparsable_dates_sort_last_in_original_order() {
        let points = vec![
            point("last week", dec!(1)),
            point("2024-01-02", dec!(2)),
            point("yesterday", dec!(3)),
            point("2024-01-01T00:00:00Z", dec!(4)),
        ];

        let normalized = normalize(points);
        assert_eq!(
            dates(&normalized),
            ["2024-01-01T00:00:00Z", "2024-01-02", "last week", "yesterday"]
        );
    }

    #[test]
    fn test_duplicate_dates_keep_first() {
        let points = vec![
            point("2024-01-01", dec!(10)),
            point("2024-01-01", dec!(11)),
            point("2024-01-02", dec!(12)),
        ];

        let normalized = normalize(points);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].price, dec!(10));
    }

    #[test]
    fn test_numeric_timestamps_render_as_rfc3339() {
        let points = vec![point("1704153600000", dec!(2)), point("1704067200", dec!(1))];

        let normalized = normalize(points);
        assert_eq!(dates(&normalized), ["2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"]);
    }

    #[test]
    fn test_decimation_law() {
        for n in [0usize, 1, 19, 20, 21, 39, 40, 41, 45, 100, 365] {
            let points: Vec<_> = (0..n)
                .map(|i| point(&format!("{}", 1_700_000_000 + i * 86_400), Decimal::from(i + 1)))
                .collect();

            let normalized = normalize(points);
            if n <= MAX_CHART_POINTS {
                assert_eq!(normalized.len(), n);
            } else {
                let step = n.div_ceil(MAX_CHART_POINTS);
                assert_eq!(normalized.len(), n.div_ceil(step));
                for (k, p) in normalized.iter().enumerate() {
                    assert_eq!(p.price, Decimal::from(k * step + 1));
                }
            }
            assert!(normalized.len() <= MAX_CHART_POINTS);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut points: Vec<_> = (0..57)
            .rev()
            .map(|i| point(&format!("{}", 1_700_000_000_000_i64 + i * 3_600_000), Decimal::from(i + 1)))
            .collect();
        points.push(point("not a date", dec!(5)));
        points.push(point("2023-11-14", dec!(7)));
        points.push(point("2023-11-14", dec!(8)));

        let once = normalize(points);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_points_from_value_shapes() {
        let value = json!([
            {"date": "2024-01-01", "price": 42000.5},
            {"time": 1704153600, "close": "43100"},
            ["2024-01-03", 44000],
            {"date": "2024-01-04"},
            "junk"
        ]);

        let points = points_from_value(&value);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].price, dec!(42000.5));
        assert_eq!(points[1].date, "1704153600");
        assert_eq!(points[2].price, dec!(44000));
    }

    #[test]
    fn test_series_from_gathered_text_content() {
        let series = json!({"data": [
            {"time": 1704067200, "close": 100.5, "volume": 10},
            {"time": 1704153600, "close": 101.5, "volume": 12}
        ]});
        let mut gathered = GatheredData::new("BTC");
        gathered.tool_results.push(ToolResult::failure(ToolCall::new("Broken"), "down"));
        gathered.tool_results.push(ToolResult::success(
            ToolCall::new("Topic_Time_Series"),
            json!({"content": [{"type": "text", "text": series.to_string()}]}),
        ));

        let points = series_from_gathered(&gathered);
        assert_eq!(dates(&points), ["2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"]);
        assert_eq!(points[1].price, dec!(101.5));
    }

    #[test]
    fn test_no_series_means_empty_chart() {
        let mut gathered = GatheredData::new("BTC");
        gathered.tool_results.push(ToolResult::success(
            ToolCall::new("Topic"),
            json!({"content": [{"type": "text", "text": "Price: $100"}]}),
        ));
        assert!(series_from_gathered(&gathered).is_empty());
    }
}
