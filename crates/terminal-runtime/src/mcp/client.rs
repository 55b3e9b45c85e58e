//! Tool Invoker
//!
//! `tools/list` and `tools/call` over an `McpSession`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use terminal_core::{Result, TerminalError, ToolDescriptor, ToolSource};

use super::config::McpConfig;
use super::session::McpSession;

#[derive(Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

/// Tool client for one session; close it when the analysis ends
pub struct McpClient {
    session: McpSession,
}

impl McpClient {
    pub const fn new(session: McpSession) -> Self {
        Self { session }
    }

    /// Open a session and wrap it
    pub async fn connect(config: &McpConfig) -> Result<Self> {
        McpSession::connect(config).await.map(Self::new)
    }

    pub const fn session(&self) -> &McpSession {
        &self.session
    }

    /// Release the session; safe to call more than once
    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }

    /// Fetch the provider's tool catalog
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let result = self.session.request("tools/list", json!({})).await?;
        let listed: ListToolsResult = serde_json::from_value(result)?;
        tracing::info!(count = listed.tools.len(), "Listed provider tools");
        Ok(listed.tools)
    }

    /// Invoke a tool; arguments are forwarded as-is
    pub async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value> {
        let logged_arguments = Value::Object(arguments.clone());
        tracing::info!(tool = name, arguments = %logged_arguments, "Calling tool");

        let result = self
            .session
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
            .inspect_err(|e| tracing::warn!(tool = name, error = %e, "Tool call failed"))?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            let message = content_text(&result).unwrap_or_else(|| "tool reported an error".into());
            tracing::warn!(tool = name, %message, "Tool returned an error result");
            return Err(TerminalError::Provider { code: 0, message });
        }

        Ok(result)
    }
}

#[async_trait]
impl ToolSource for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Self::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value> {
        Self::call_tool(self, name, arguments).await
    }
}

/// Concatenated `text` parts of an MCP `content` array
fn content_text(result: &Value) -> Option<String> {
    let parts: Vec<&str> = result
        .get("content")?
        .as_array()?
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    (!parts.is_empty()).then(|| parts.join("\n"))
}
