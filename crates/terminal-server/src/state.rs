//! Application State

use std::sync::Arc;

use crypto_terminal::{OrchestratorConfig, TradingOrchestrator};
use terminal_core::{LlmProvider, Result, TerminalError};
use terminal_runtime::{GeminiProvider, McpConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Model provider (None when GEMINI_API_KEY is missing)
    pub provider: Option<Arc<dyn LlmProvider>>,

    /// Data provider settings; each analysis opens its own session
    pub mcp: Arc<McpConfig>,

    pub orchestrator: Arc<OrchestratorConfig>,
}

impl AppState {
    /// Build from the environment. Missing keys are logged, not fatal:
    /// requests fail individually until they are set.
    pub fn from_env() -> Self {
        let provider: Option<Arc<dyn LlmProvider>> = match GeminiProvider::from_env() {
            Ok(provider) => {
                tracing::info!(model = %provider.config().model, "✓ Gemini configured");
                Some(Arc::new(provider))
            }
            Err(e) => {
                tracing::warn!("⚠ Gemini not configured: {e}");
                tracing::warn!("  Set GEMINI_API_KEY in .env");
                None
            }
        };

        let mcp = McpConfig::from_env();
        if mcp.is_configured() {
            tracing::info!(url = %mcp.sse_url, "✓ Data provider configured");
        } else {
            tracing::warn!("⚠ Data provider not configured - analyses will fail");
            tracing::warn!("  Set LUNARCRUSH_API_KEY in .env");
        }

        Self {
            provider,
            mcp: Arc::new(mcp),
            orchestrator: Arc::new(OrchestratorConfig::default()),
        }
    }

    /// Orchestrator for one request
    pub fn orchestrator(&self) -> Result<TradingOrchestrator> {
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| TerminalError::Config("GEMINI_API_KEY is not set".into()))?;
        Ok(TradingOrchestrator::with_config(provider, (*self.orchestrator).clone()))
    }
}
