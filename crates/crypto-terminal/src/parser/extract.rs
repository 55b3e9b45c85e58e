//! JSON extraction from free-form model text
//!
//! Models wrap their JSON in prose and markdown fences, and sometimes stop
//! mid-object when they hit the token limit. Extraction walks the text with
//! a bracket-balancing scanner that is aware of string literals, and falls
//! back to repairing an unterminated span.

use std::collections::VecDeque;

use serde_json::Value;

/// Upper bound on repair attempts for one truncated span
const MAX_REPAIR_ATTEMPTS: usize = 512;

/// Which top-level JSON container to look for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Object,
    Array,
}

impl Container {
    const fn open(self) -> char {
        match self {
            Self::Object => '{',
            Self::Array => '[',
        }
    }
}

/// A parsed span and whether it had to be repaired
#[derive(Clone, Debug, PartialEq)]
pub struct Extracted {
    pub value: Value,
    pub repaired: bool,
}

/// Result of scanning from an opening bracket
#[derive(Debug, PartialEq, Eq)]
enum Scan {
    /// Balanced span ending at this byte offset (exclusive)
    Closed(usize),
    /// Text ended with containers still open
    Unterminated,
}

/// Find the first span of the requested kind that parses as JSON.
///
/// Candidates are tried left to right; a balanced span that fails to parse
/// is skipped. An unterminated span is repaired on the spot: every later
/// opener is nested inside it, so a complete inner object must not stand
/// in for the truncated outer one. A repair that only recovers an empty
/// container is kept as a last resort while scanning continues.
pub fn extract(text: &str, container: Container) -> Option<Extracted> {
    let open = container.open();
    let mut last_resort = None;

    for (start, _) in text.char_indices().filter(|&(_, c)| c == open) {
        let candidate = &text[start..];
        match scan(candidate) {
            Scan::Closed(end) => {
                if let Ok(value) = serde_json::from_str::<Value>(&candidate[..end]) {
                    return Some(Extracted {
                        value,
                        repaired: false,
                    });
                }
            }
            Scan::Unterminated => match repair(candidate) {
                Some(value) if !is_empty_container(&value) => {
                    tracing::debug!(length = candidate.len(), "Repaired truncated JSON span");
                    return Some(Extracted {
                        value,
                        repaired: true,
                    });
                }
                Some(value) => {
                    last_resort.get_or_insert(value);
                }
                None => {}
            },
        }
    }

    last_resort.map(|value| Extracted {
        value,
        repaired: true,
    })
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Scan a fragment that starts with an opening bracket
fn scan(fragment: &str) -> Scan {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in fragment.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Scan::Closed(i + 1);
                }
            }
            _ => {}
        }
    }

    Scan::Unterminated
}

/// Close an unterminated fragment.
///
/// Walks back over value boundaries (after a string, after a closing
/// bracket, before a comma), cuts the text there and re-closes whatever
/// containers were open at that point. The latest cut that parses wins.
pub fn repair(fragment: &str) -> Option<Value> {
    // (cut offset, containers open at the cut)
    let mut cuts: VecDeque<(usize, Vec<char>)> = VecDeque::new();
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in fragment.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if in_string {
            match ch {
                '\\' => escape_next = true,
                '"' => {
                    in_string = false;
                    record(&mut cuts, i + 1, &stack);
                }
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => {
                stack.push(ch);
                // An empty container is always a valid last resort
                if stack.len() == 1 {
                    record(&mut cuts, i + 1, &stack);
                }
            }
            '}' | ']' => {
                stack.pop();
                record(&mut cuts, i + 1, &stack);
            }
            ',' => record(&mut cuts, i, &stack),
            _ => {}
        }
    }

    cuts.iter().rev().find_map(|(at, open)| {
        let mut candidate = fragment[..*at].trim_end().to_string();
        for bracket in open.iter().rev() {
            candidate.push(if *bracket == '{' { '}' } else { ']' });
        }
        serde_json::from_str::<Value>(&candidate).ok()
    })
}

fn record(cuts: &mut VecDeque<(usize, Vec<char>)>, at: usize, stack: &[char]) {
    if stack.is_empty() {
        return;
    }
    if cuts.len() == MAX_REPAIR_ATTEMPTS {
        cuts.pop_front();
    }
    cuts.push_back((at, stack.to_vec()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(text: &str) -> Option<Extracted> {
        extract(text, Container::Object)
    }

    #[test]
    fn test_clean_object() {
        let found = object(r#"{"recommendation": "BUY", "confidence": 82}"#).unwrap();
        assert_eq!(found.value["confidence"], 82);
        assert!(!found.repaired);
    }

    #[test]
    fn test_object_inside_markdown_and_prose() {
        let text = "Here is the analysis:\n```json\n{\"recommendation\": \"HOLD\", \"nested\": {\"a\": [1, 2]}}\n```\nDone.";
        let found = object(text).unwrap();
        assert_eq!(found.value["nested"]["a"], json!([1, 2]));
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"{"reasoning": "range went from {low} to \"{high}\"", "confidence": 5}"#;
        let found = object(text).unwrap();
        assert_eq!(found.value["confidence"], 5);
    }

    #[test]
    fn test_skips_non_json_brace_spans() {
        let text = "Use {symbol} as input. Result: {\"ok\": true}";
        assert_eq!(object(text).unwrap().value, json!({"ok": true}));
    }

    #[test]
    fn test_array_extraction() {
        let text = "I'd call these:\n[{\"tool\": \"Topic\", \"args\": {\"topic\": \"btc\"}}]";
        let found = extract(text, Container::Array).unwrap();
        assert_eq!(found.value[0]["tool"], "Topic");
    }

    #[test]
    fn test_no_span() {
        assert_eq!(object("I cannot help with that."), None);
        assert_eq!(extract("{\"a\": 1}", Container::Array), None);
    }

    #[test]
    fn test_repairs_truncated_object() {
        let text = r#"{"recommendation": "BUY", "confidence": 74, "reasoning": "Strong social volume and ris"#;
        let found = object(text).unwrap();
        assert!(found.repaired);
        assert_eq!(found.value, json!({"recommendation": "BUY", "confidence": 74}));
    }

    #[test]
    fn test_repairs_inside_nested_containers() {
        let text = r#"{"recommendation": "SELL", "ai_analysis": {"summary": "weak", "pros": ["a", "b"#;
        let found = object(text).unwrap();
        assert_eq!(found.value["recommendation"], "SELL");
        assert_eq!(found.value["ai_analysis"]["pros"], json!(["a"]));
    }

    #[test]
    fn test_truncated_outer_object_beats_complete_inner_one() {
        let text = r#"{"recommendation": "BUY", "key_metrics": {"price": 142.5}, "reasoning": "Strong momentum and ris"#;
        let found = object(text).unwrap();
        assert!(found.repaired);
        assert_eq!(found.value["recommendation"], "BUY");
        assert_eq!(found.value["key_metrics"]["price"], 142.5);
    }

    #[test]
    fn test_truncated_plan_keeps_calls_with_array_arguments() {
        let text = r#"[{"tool": "Topic", "args": {"topic": "sol"}}, {"tool": "Posts", "args": {"topics": ["sol", "solana"]}}, {"tool": "Cryp"#;
        let found = extract(text, Container::Array).unwrap();
        assert!(found.repaired);
        assert_eq!(found.value.as_array().map(Vec::len), Some(2));
        assert_eq!(found.value[1]["args"]["topics"], json!(["sol", "solana"]));
    }

    #[test]
    fn test_prose_brace_before_json_is_skipped() {
        let text = "Brackets like { show up in prose. {\"ok\": true}";
        assert_eq!(object(text).unwrap().value, json!({"ok": true}));
    }

    #[test]
    fn test_repair_of_bare_opening() {
        assert_eq!(repair("{"), Some(json!({})));
        assert_eq!(repair("[{\"tool\": "), Some(json!([])));
    }

    #[test]
    fn test_repair_never_panics() {
        let inputs = [
            "",
            "{",
            "{\"",
            "{\"a\\",
            "{\"a\": \"\\u00",
            "[[[[[[",
            "{\"é\": \"ü\", \"ß",
            "{]]]]",
            "}{",
            "{\"a\": 1,,,,",
        ];
        for input in inputs {
            let _ = repair(input);
            let _ = object(input);
            let _ = extract(input, Container::Array);
        }

        let long = format!("{{{}", "\"k\": 1, ".repeat(5_000));
        assert!(object(&long).is_some());
    }
}
