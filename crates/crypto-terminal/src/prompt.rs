//! Prompt Builder
//!
//! User-turn prompts for the two model calls of an analysis. The system
//! instructions live in the crate root.

use serde_json::{json, Value};
use terminal_core::{ToolCatalog, ToolOutcome};

use crate::model::GatheredData;

/// Longest serialized tool result embedded in the analysis prompt
pub const MAX_RESULT_CHARS: usize = 12_000;

/// Ask the model which tools to call for `symbol`
pub fn tool_selection_prompt(symbol: &str, catalog: &ToolCatalog, max_calls: usize) -> String {
    format!(
        r#"Symbol: {symbol}

## Available tools

{tools}
## Task

Choose up to {max_calls} of the tools above that together give the best picture of {symbol}:
current price and market data, social sentiment and engagement, and recent price history.
Use the exact tool names and only arguments their schemas accept.

Respond with a JSON array only, no prose:
[
  {{"tool": "<tool name>", "args": {{"<argument>": "<value>"}}, "reason": "<why this data is needed>"}}
]"#,
        tools = catalog.generate_prompt_section(),
    )
}

/// Ask the model for the final recommendation over everything gathered
pub fn analysis_prompt(gathered: &GatheredData) -> String {
    let symbol = &gathered.symbol;
    format!(
        r#"Symbol: {symbol}

## Gathered data

{data}

## Task

Analyze {symbol} for a short-term trade using ONLY the gathered data above.
Never invent numbers or use placeholders: if a value is not in the data, leave it out.
Tool entries with an "error" field failed; do not guess what they would have returned.

Respond with a single JSON object, no prose, in exactly this shape:
{{
  "recommendation": "BUY" | "SELL" | "HOLD",
  "confidence": <integer 0-100>,
  "reasoning": "<2-4 sentences grounded in the data>",
  "social_sentiment": "bullish" | "bearish" | "neutral",
  "key_metrics": {{
    "price": <number>,
    "change_24h": <percent number>,
    "volume_24h": <number>,
    "market_cap": <number>,
    "galaxy_score": <number>,
    "alt_rank": <number>,
    "social_dominance": <number>,
    "sentiment": <number>,
    "interactions_24h": <number>
  }},
  "ai_analysis": {{
    "summary": "<one paragraph>",
    "pros": ["<strength>"],
    "cons": ["<risk>"],
    "key_factors": ["<factor to watch>"]
  }},
  "chart_data": [{{"date": "YYYY-MM-DD", "price": <number>}}]
}}

chart_data must contain only real historical prices from the gathered data, oldest first, at most 20 points.
Use an empty array if the data has no price history."#,
        data = render_gathered(gathered),
    )
}

/// Gathered data as pretty JSON with oversized results cut down
pub fn render_gathered(gathered: &GatheredData) -> String {
    let results: Vec<Value> = gathered
        .tool_results
        .iter()
        .map(|r| {
            let mut entry = json!({
                "tool": r.tool,
                "arguments": r.arguments,
                "reason": r.reason,
            });
            match &r.outcome {
                ToolOutcome::Result(value) => entry["result"] = cap_result(value),
                ToolOutcome::Error(message) => entry["error"] = json!(message),
            }
            entry
        })
        .collect();

    let document = json!({ "symbol": gathered.symbol, "toolResults": results });
    serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string())
}

fn cap_result(value: &Value) -> Value {
    let text = value.to_string();
    match text.char_indices().nth(MAX_RESULT_CHARS) {
        Some((cut, _)) => json!(format!("{}... [truncated]", &text[..cut])),
        None => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terminal_core::{ToolCall, ToolDescriptor, ToolResult};

    #[test]
    fn test_selection_prompt_lists_tools() {
        let catalog = ToolCatalog::new(vec![
            ToolDescriptor::new("Topic").with_description("Social metrics for a topic"),
            ToolDescriptor::new("Cryptocurrencies"),
        ]);

        let prompt = tool_selection_prompt("SOL", &catalog, 4);
        assert!(prompt.starts_with("Symbol: SOL"));
        assert!(prompt.contains("### Topic\nSocial metrics for a topic"));
        assert!(prompt.contains("### Cryptocurrencies"));
        assert!(prompt.contains("Choose up to 4"));
        assert!(prompt.contains(r#"{"tool": "<tool name>""#));
    }

    #[test]
    fn test_analysis_prompt_embeds_results_and_errors() {
        let mut gathered = GatheredData::new("SOL");
        gathered.tool_results.push(ToolResult::success(
            ToolCall::new("Topic").with_argument("topic", "sol"),
            json!({"price": 142.5}),
        ));
        gathered
            .tool_results
            .push(ToolResult::failure(ToolCall::new("Cryptocurrencies"), "quota exceeded"));

        let prompt = analysis_prompt(&gathered);
        assert!(prompt.contains("\"toolResults\""));
        assert!(prompt.contains("\"price\": 142.5"));
        assert!(prompt.contains("\"error\": \"quota exceeded\""));
        assert!(prompt.contains("\"recommendation\": \"BUY\" | \"SELL\" | \"HOLD\""));
    }

    #[test]
    fn test_oversized_results_are_capped() {
        let mut gathered = GatheredData::new("BTC");
        gathered.tool_results.push(ToolResult::success(
            ToolCall::new("Posts"),
            json!({"text": "é".repeat(MAX_RESULT_CHARS * 2)}),
        ));

        let rendered: Value = serde_json::from_str(&render_gathered(&gathered)).unwrap();
        let result = rendered["toolResults"][0]["result"].as_str().unwrap();
        assert!(result.ends_with("... [truncated]"));
        assert!(result.chars().count() <= MAX_RESULT_CHARS + 20);
    }
}
