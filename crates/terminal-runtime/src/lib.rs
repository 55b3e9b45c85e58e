//! # terminal-runtime
//!
//! Network integrations for the trading terminal.
//!
//! ## Integrations
//!
//! - **Gemini** (default): `LlmProvider` over the `generateContent` REST API
//! - **MCP**: streaming tool client for the social-intelligence data provider
//!   (SSE session, JSON-RPC request correlation, tool invocation)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use terminal_runtime::{GeminiProvider, McpClient, McpConfig};
//!
//! let provider = GeminiProvider::from_env()?;
//! let mut tools = McpClient::connect(&McpConfig::from_env()).await?;
//! let catalog = tools.list_tools().await?;
//! tools.disconnect();
//! ```

#[cfg(feature = "gemini")]
pub mod gemini;
pub mod mcp;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiProvider};
pub use mcp::{McpClient, McpConfig, McpSession, RequestCorrelator};

// Re-export core types for convenience
pub use terminal_core::{
    LlmProvider, Message, Result, Role, TerminalError, ToolDescriptor, ToolSource,
};
