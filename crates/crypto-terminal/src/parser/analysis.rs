//! Model answers to typed values

use chrono::Utc;
use serde_json::{Map, Value};
use terminal_core::{Result, TerminalError, ToolCall};

use super::chart::{normalize, points_from_value};
use super::extract::{extract, Container};
use crate::metrics::metrics_from_object;
use crate::model::{AiAnalysis, Recommendation, Sentiment, TradingAnalysis, DEFAULT_CONFIDENCE};

/// Tool calls from a tool-selection answer.
///
/// `None` when the answer holds no JSON array. Entries that are not valid
/// calls are dropped; catalog validation happens later.
pub fn parse_tool_plan(text: &str) -> Option<Vec<ToolCall>> {
    let extracted = extract(text, Container::Array)?;
    let Value::Array(entries) = extracted.value else {
        return None;
    };

    let calls = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<ToolCall>(entry) {
            Ok(call) if !call.tool.trim().is_empty() => Some(call),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed tool call");
                None
            }
        })
        .collect();

    Some(calls)
}

/// Confidence as an integer percentage.
///
/// Accepts numbers and numeric strings such as `"82%"`; rounds, clamps to
/// 0..=100 and defaults to 50 when absent or unreadable.
pub fn parse_confidence(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };

    match raw {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(n) if n.is_finite() => n.round().clamp(0.0, 100.0) as u8,
        _ => DEFAULT_CONFIDENCE,
    }
}

/// Build a `TradingAnalysis` from the final answer.
///
/// Only `recommendation` is required; everything else has a default.
/// Metrics and chart are taken as the model gave them and completed from
/// gathered data by the caller.
pub fn parse_analysis(text: &str, symbol: &str) -> Result<TradingAnalysis> {
    let extracted = extract(text, Container::Object)
        .ok_or_else(|| TerminalError::Parse("no JSON object in model response".into()))?;
    if extracted.repaired {
        tracing::warn!(symbol, "Model response was truncated; using repaired JSON");
    }

    let Value::Object(object) = extracted.value else {
        return Err(TerminalError::Parse("model response is not an object".into()));
    };

    let recommendation = object
        .get("recommendation")
        .and_then(Value::as_str)
        .and_then(Recommendation::parse)
        .ok_or_else(|| TerminalError::Parse("missing or invalid recommendation".into()))?;

    let social_sentiment = object
        .get("social_sentiment")
        .or_else(|| object.get("sentiment"))
        .and_then(Value::as_str)
        .map(Sentiment::parse)
        .unwrap_or_default();

    let key_metrics = object
        .get("key_metrics")
        .and_then(Value::as_object)
        .map(metrics_from_object)
        .unwrap_or_default();

    let chart_data = object
        .get("chart_data")
        .map(|series| normalize(points_from_value(series)))
        .unwrap_or_default();

    Ok(TradingAnalysis {
        symbol: symbol.to_string(),
        recommendation,
        confidence: parse_confidence(object.get("confidence")),
        reasoning: string_field(&object, "reasoning"),
        social_sentiment,
        key_metrics,
        ai_analysis: object
            .get("ai_analysis")
            .and_then(Value::as_object)
            .map(ai_analysis)
            .unwrap_or_default(),
        chart_data,
        timestamp: Utc::now(),
        success: true,
        degraded: false,
        error: None,
    })
}

fn ai_analysis(object: &Map<String, Value>) -> AiAnalysis {
    AiAnalysis {
        summary: string_field(object, "summary"),
        pros: string_list(object.get("pros")),
        cons: string_list(object.get("cons")),
        key_factors: string_list(object.get("key_factors").or_else(|| object.get("keyFactors"))),
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
