//! Domain Models
//!
//! Output types of one terminal analysis. Prices and metrics use
//! `rust_decimal` and are serialized as plain JSON numbers for the UI.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use terminal_core::ToolResult;

/// Confidence used whenever the model gives none
pub const DEFAULT_CONFIDENCE: u8 = 50;

/// Trading recommendation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl Recommendation {
    /// Case-insensitive; "STRONG BUY" / "strong_sell" fold into BUY / SELL
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        let word = normalized.strip_prefix("STRONG ").unwrap_or(&normalized).trim();

        match word {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "HOLD" => Some(Self::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Social sentiment label
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Lenient parse; anything unrecognised is neutral
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bullish" | "positive" | "very bullish" => Self::Bullish,
            "bearish" | "negative" | "very bearish" => Self::Bearish,
            _ => Self::Neutral,
        }
    }
}

/// Headline numbers for the symbol.
///
/// Absent metrics stay `None` and are left out of the JSON entirely.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Percent change over 24h
    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub galaxy_score: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub alt_rank: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub social_dominance: Option<Decimal>,

    /// Numeric sentiment score (label-style sentiment lives in `extra`)
    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub interactions_24h: Option<Decimal>,

    /// Other named numeric or string fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl KeyMetrics {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(Option::is_none) && self.extra.is_empty()
    }

    /// Fill missing fields from `other`; values already present win
    pub fn fill_gaps(&mut self, other: &Self) {
        let theirs = other.fields();
        for (slot, value) in self.fields_mut().into_iter().zip(theirs) {
            if slot.is_none() {
                *slot = value;
            }
        }
        for (key, value) in &other.extra {
            self.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Set a field by its canonical name; false when the name is unknown
    pub fn set(&mut self, name: &str, value: Decimal) -> bool {
        let slot = match name {
            "price" => &mut self.price,
            "change_24h" => &mut self.change_24h,
            "volume_24h" => &mut self.volume_24h,
            "market_cap" => &mut self.market_cap,
            "galaxy_score" => &mut self.galaxy_score,
            "alt_rank" => &mut self.alt_rank,
            "social_dominance" => &mut self.social_dominance,
            "sentiment" => &mut self.sentiment,
            "interactions_24h" => &mut self.interactions_24h,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Whether the named field is already populated
    pub fn has(&self, name: &str) -> bool {
        match name {
            "price" => self.price.is_some(),
            "change_24h" => self.change_24h.is_some(),
            "volume_24h" => self.volume_24h.is_some(),
            "market_cap" => self.market_cap.is_some(),
            "galaxy_score" => self.galaxy_score.is_some(),
            "alt_rank" => self.alt_rank.is_some(),
            "social_dominance" => self.social_dominance.is_some(),
            "sentiment" => self.sentiment.is_some(),
            "interactions_24h" => self.interactions_24h.is_some(),
            _ => self.extra.contains_key(name),
        }
    }

    const fn fields(&self) -> [Option<Decimal>; 9] {
        [
            self.price,
            self.change_24h,
            self.volume_24h,
            self.market_cap,
            self.galaxy_score,
            self.alt_rank,
            self.social_dominance,
            self.sentiment,
            self.interactions_24h,
        ]
    }

    fn fields_mut(&mut self) -> [&mut Option<Decimal>; 9] {
        [
            &mut self.price,
            &mut self.change_24h,
            &mut self.volume_24h,
            &mut self.market_cap,
            &mut self.galaxy_score,
            &mut self.alt_rank,
            &mut self.social_dominance,
            &mut self.sentiment,
            &mut self.interactions_24h,
        ]
    }
}

/// Narrative part of the analysis
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub summary: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub key_factors: Vec<String>,
}

/// One point of the price chart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Date token as supplied, or RFC 3339 for numeric timestamps
    pub date: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl ChartPoint {
    pub fn new(date: impl Into<String>, price: Decimal) -> Self {
        Self {
            date: date.into(),
            price,
        }
    }
}

/// Everything the tools returned for one symbol, failures included
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatheredData {
    pub symbol: String,
    pub tool_results: Vec<ToolResult>,
}

impl GatheredData {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            tool_results: Vec::new(),
        }
    }

    pub fn successes(&self) -> impl Iterator<Item = &ToolResult> {
        self.tool_results.iter().filter(|r| r.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.tool_results.iter().filter(|r| !r.is_success()).count()
    }
}

/// Final analysis handed to the UI
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradingAnalysis {
    pub symbol: String,
    pub recommendation: Recommendation,

    /// 0..=100
    pub confidence: u8,
    pub reasoning: String,
    pub social_sentiment: Sentiment,
    pub key_metrics: KeyMetrics,
    pub ai_analysis: AiAnalysis,
    pub chart_data: Vec<ChartPoint>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,

    /// True when the model's answer was unusable and this was synthesized
    #[serde(default)]
    pub degraded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TradingAnalysis {
    /// Neutral analysis built from gathered data alone
    pub fn fallback(
        symbol: impl Into<String>,
        key_metrics: KeyMetrics,
        chart_data: Vec<ChartPoint>,
        reason: impl Into<String>,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            reasoning: format!(
                "The AI response for {symbol} could not be interpreted, so no directional call is made. \
                 Metrics and chart below come directly from the gathered market data."
            ),
            ai_analysis: AiAnalysis {
                summary: format!("Automated analysis for {symbol} was unavailable; defaulting to HOLD."),
                ..Default::default()
            },
            symbol,
            recommendation: Recommendation::Hold,
            confidence: DEFAULT_CONFIDENCE,
            social_sentiment: Sentiment::Neutral,
            key_metrics,
            chart_data,
            timestamp: Utc::now(),
            success: true,
            degraded: true,
            error: Some(reason.into()),
        }
    }
}

/// How an analysis was obtained.
///
/// Fatal failures are the `Err` side of `TradingOrchestrator::analyze`.
#[derive(Clone, Debug)]
pub enum AnalysisOutcome {
    /// The model's answer parsed and validated
    Model(TradingAnalysis),
    /// The answer was unusable; `analysis` is the neutral fallback
    Degraded {
        analysis: TradingAnalysis,
        reason: String,
    },
}

impl AnalysisOutcome {
    pub const fn analysis(&self) -> &TradingAnalysis {
        match self {
            Self::Model(analysis) | Self::Degraded { analysis, .. } => analysis,
        }
    }

    pub fn into_analysis(self) -> TradingAnalysis {
        match self {
            Self::Model(analysis) | Self::Degraded { analysis, .. } => analysis,
        }
    }

    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}
