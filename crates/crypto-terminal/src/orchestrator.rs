//! Trading Orchestrator
//!
//! Drives one analysis end to end:
//!
//! ```text
//! list_tools ──► model: pick tools ──► call_tool × N (concurrent)
//!                                              │
//!          TradingAnalysis ◄── parse ◄── model: analyze gathered data
//! ```
//!
//! Discovery failures and model-gateway failures abort the analysis.
//! Individual tool failures are recorded and the analysis carries on with
//! whatever data arrived. An unusable final answer degrades to a neutral
//! HOLD built from the gathered data.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use terminal_core::{
    GenerationOptions, LlmProvider, Message, Result, ToolCall, ToolCatalog, ToolResult, ToolSource,
};

use crate::metrics::metrics_from_gathered;
use crate::model::{AnalysisOutcome, GatheredData, TradingAnalysis};
use crate::parser::{parse_analysis, parse_tool_plan, series_from_gathered};
use crate::prompt::{analysis_prompt, tool_selection_prompt};
use crate::{ANALYSIS_SYSTEM_PROMPT, TOOL_SELECTION_SYSTEM_PROMPT};

/// Generic tools used when the model's plan is unusable
const FALLBACK_TOPIC_TOOL: &str = "topic";
const FALLBACK_LIST_TOOL: &str = "cryptocurrencies";
const SYMBOL_ARGUMENTS: [&str; 3] = ["topic", "symbol", "coin"];

/// Orchestrator settings
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Options for the tool-selection call
    pub selection: GenerationOptions,

    /// Options for the final analysis call
    pub analysis: GenerationOptions,

    /// Most tool calls executed per analysis
    pub max_tool_calls: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        // Empty model: the provider's configured model is used
        Self {
            selection: GenerationOptions {
                model: String::new(),
                temperature: 0.2,
                max_tokens: 1024,
                ..Default::default()
            },
            analysis: GenerationOptions {
                model: String::new(),
                temperature: 0.4,
                max_tokens: 4096,
                ..Default::default()
            },
            max_tool_calls: 6,
        }
    }
}

/// Runs the tool-selection / gathering / analysis pipeline
pub struct TradingOrchestrator {
    provider: Arc<dyn LlmProvider>,
    config: OrchestratorConfig,
}

impl TradingOrchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self::with_config(provider, OrchestratorConfig::default())
    }

    pub fn with_config(provider: Arc<dyn LlmProvider>, config: OrchestratorConfig) -> Self {
        Self { provider, config }
    }

    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Analyze `symbol` using the tools behind `tools`
    pub async fn analyze(&self, symbol: &str, tools: &dyn ToolSource) -> Result<AnalysisOutcome> {
        let start = Instant::now();
        tracing::info!(symbol, provider = self.provider.name(), "Starting analysis");

        let catalog = ToolCatalog::new(tools.list_tools().await?);
        tracing::info!(symbol, tools = catalog.len(), "Tool catalog loaded");

        let plan = self.plan(symbol, &catalog).await?;
        let gathered = self.gather(symbol, tools, plan).await;
        let outcome = self.synthesize(gathered).await?;

        let analysis = outcome.analysis();
        tracing::info!(
            symbol,
            recommendation = %analysis.recommendation,
            confidence = analysis.confidence,
            degraded = outcome.is_degraded(),
            elapsed_ms = start.elapsed().as_millis(),
            "Analysis complete"
        );

        Ok(outcome)
    }

    /// Ask the model for a tool plan, validated against the catalog
    pub async fn plan(&self, symbol: &str, catalog: &ToolCatalog) -> Result<Vec<ToolCall>> {
        let messages = [
            Message::system(TOOL_SELECTION_SYSTEM_PROMPT),
            Message::user(tool_selection_prompt(symbol, catalog, self.config.max_tool_calls)),
        ];
        let completion = self.provider.complete(&messages, &self.config.selection).await?;

        let planned = parse_tool_plan(&completion.content).unwrap_or_else(|| {
            tracing::warn!(symbol, "No tool plan in model response");
            Vec::new()
        });

        let mut plan: Vec<ToolCall> = planned
            .into_iter()
            .filter_map(|mut call| match catalog.validate(&mut call) {
                Ok(()) => Some(call),
                Err(e) => {
                    tracing::warn!(symbol, tool = %call.tool, error = %e, "Dropping planned call");
                    None
                }
            })
            .collect();

        if plan.is_empty() {
            plan = fallback_plan(catalog, symbol);
            tracing::info!(symbol, tools = ?tool_names(&plan), "Using fallback tool plan");
        }

        if plan.len() > self.config.max_tool_calls {
            tracing::debug!(symbol, planned = plan.len(), "Capping tool plan");
            plan.truncate(self.config.max_tool_calls);
        }

        Ok(plan)
    }

    /// Execute every call concurrently; failures are recorded, not raised
    pub async fn gather(&self, symbol: &str, tools: &dyn ToolSource, plan: Vec<ToolCall>) -> GatheredData {
        let calls = plan.into_iter().map(|call| async move {
            let started = Instant::now();
            match tools.call_tool(&call.tool, &call.arguments).await {
                Ok(value) => {
                    tracing::info!(symbol, tool = %call.tool, elapsed_ms = started.elapsed().as_millis(), "Tool call succeeded");
                    ToolResult::success(call, value)
                }
                Err(e) => {
                    tracing::warn!(symbol, tool = %call.tool, error = %e, elapsed_ms = started.elapsed().as_millis(), "Tool call failed");
                    ToolResult::failure(call, e.to_string())
                }
            }
        });

        let mut gathered = GatheredData::new(symbol);
        gathered.tool_results = join_all(calls).await;

        if gathered.tool_results.is_empty() {
            tracing::warn!(symbol, "No tools were called; analysis has no data");
        } else if gathered.failure_count() > 0 {
            tracing::warn!(
                symbol,
                failed = gathered.failure_count(),
                total = gathered.tool_results.len(),
                "Continuing with partial data"
            );
        }

        gathered
    }

    /// Ask the model for the analysis and complete it from gathered data
    pub async fn synthesize(&self, gathered: GatheredData) -> Result<AnalysisOutcome> {
        let messages = [
            Message::system(ANALYSIS_SYSTEM_PROMPT),
            Message::user(analysis_prompt(&gathered)),
        ];
        let completion = self.provider.complete(&messages, &self.config.analysis).await?;
        if completion.truncated {
            tracing::warn!(symbol = %gathered.symbol, "Analysis response hit the token limit");
        }

        let gathered_metrics = metrics_from_gathered(&gathered);

        match parse_analysis(&completion.content, &gathered.symbol) {
            Ok(mut analysis) => {
                analysis.key_metrics.fill_gaps(&gathered_metrics);
                if analysis.chart_data.is_empty() {
                    analysis.chart_data = series_from_gathered(&gathered);
                }
                Ok(AnalysisOutcome::Model(analysis))
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(symbol = %gathered.symbol, error = %reason, "Falling back to neutral analysis");
                let analysis = TradingAnalysis::fallback(
                    gathered.symbol.clone(),
                    gathered_metrics,
                    series_from_gathered(&gathered),
                    reason.clone(),
                );
                Ok(AnalysisOutcome::Degraded { analysis, reason })
            }
        }
    }
}

/// Generic calls for when the model gives no usable plan.
///
/// Prefers the catalog's `topic` and `cryptocurrencies` tools; without
/// either, the first tool taking a topic, symbol or coin argument.
pub fn fallback_plan(catalog: &ToolCatalog, symbol: &str) -> Vec<ToolCall> {
    let subject = symbol.to_lowercase();
    let mut plan = Vec::new();

    if let Some(topic) = catalog.find_ignore_case(FALLBACK_TOPIC_TOOL) {
        plan.push(
            ToolCall::new(topic.name.clone())
                .with_argument("topic", subject.clone())
                .with_reason("Social and market metrics for the symbol"),
        );
    }
    if let Some(list) = catalog.find_ignore_case(FALLBACK_LIST_TOOL) {
        let mut call = ToolCall::new(list.name.clone()).with_reason("Market overview");
        if catalog.validate(&mut call).is_ok() {
            plan.push(call);
        }
    }
    if !plan.is_empty() {
        return plan;
    }

    catalog
        .descriptors()
        .iter()
        .find_map(|tool| {
            let argument = SYMBOL_ARGUMENTS.iter().find(|arg| {
                tool.accepts_argument(arg) || tool.required_arguments().contains(arg)
            })?;
            Some(
                ToolCall::new(tool.name.clone())
                    .with_argument(*argument, subject.clone())
                    .with_reason("Data for the symbol"),
            )
        })
        .into_iter()
        .collect()
}

fn tool_names(plan: &[ToolCall]) -> Vec<&str> {
    plan.iter().map(|c| c.tool.as_str()).collect()
}
