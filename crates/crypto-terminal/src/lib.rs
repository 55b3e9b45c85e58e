//! # crypto-terminal
//!
//! AI trading terminal pipeline. For one ticker symbol it lets a generative
//! model pick social-intelligence tools, runs them concurrently, and has the
//! model turn the gathered data into a BUY/SELL/HOLD call.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  POST /api/analyze  symbol=SOL                                │
//! ├──────────────────────────────────────────────────────────────┤
//! │  1. list_tools          Topic, Cryptocurrencies, Posts ...    │
//! │  2. model: plan         [{"tool": "Topic", "args": ...}]      │
//! │  3. call_tool × N       concurrent, failures recorded         │
//! │  4. model: analyze      {"recommendation": "BUY", ...}        │
//! │  5. parse / fallback    HOLD @ 50 when the answer is unusable │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The crate is transport-agnostic: tools arrive through
//! [`terminal_core::ToolSource`] and the model through
//! [`terminal_core::LlmProvider`].

pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod prompt;

pub use model::{
    AiAnalysis, AnalysisOutcome, ChartPoint, GatheredData, KeyMetrics, Recommendation, Sentiment,
    TradingAnalysis,
};
pub use orchestrator::{OrchestratorConfig, TradingOrchestrator};

/// System prompt for the tool-selection call
pub const TOOL_SELECTION_SYSTEM_PROMPT: &str = r"You are the data-gathering planner of a cryptocurrency trading terminal.

You are given a ticker symbol and the tools of a social-intelligence data provider. Pick the calls that
give a complete, current picture of the asset: price and market data, social sentiment and engagement,
and recent price history.

Rules:
- Only use tools from the list, spelled exactly as listed.
- Only pass arguments the tool's input schema accepts; include every required argument.
- Topic-style arguments take the lowercase coin name or symbol.
- Answer with a JSON array and nothing else.";

/// System prompt for the final analysis call
pub const ANALYSIS_SYSTEM_PROMPT: &str = r"You are a disciplined cryptocurrency trading analyst.

You receive data gathered from a social-intelligence provider for one asset and produce a short-term
BUY, SELL or HOLD recommendation.

Rules:
- Base every statement and number on the gathered data. Never use placeholder or example values.
- When the data is thin or contradictory, prefer HOLD and lower your confidence.
- Social sentiment is bullish, bearish or neutral.
- Answer with a single JSON object in the requested format and nothing else.";
