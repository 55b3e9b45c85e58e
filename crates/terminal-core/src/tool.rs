//! Tool System
//!
//! Remote tools are owned by the data provider. The terminal only sees their
//! descriptors, plans calls against them, and records each call's outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TerminalError};

/// Descriptor of a remote tool as advertised by the provider
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the accepted arguments
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Argument names listed under the schema's `required` key
    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether the schema declares a property with this name
    pub fn accepts_argument(&self, name: &str) -> bool {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(name))
    }
}

/// A planned tool invocation chosen by the model
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "name")]
    pub tool: String,

    /// Arguments, passed through to the provider uninterpreted
    #[serde(default, alias = "args")]
    pub arguments: Map<String, Value>,

    /// Why the model wants this call
    #[serde(default)]
    pub reason: String,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: Map::new(),
            reason: String::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Outcome of one executed call
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutcome {
    Result(Value),
    Error(String),
}

/// A call together with its outcome, kept for traceability
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool: String,
    pub arguments: Map<String, Value>,
    pub reason: String,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call: ToolCall, result: Value) -> Self {
        Self {
            tool: call.tool,
            arguments: call.arguments,
            reason: call.reason,
            outcome: ToolOutcome::Result(result),
        }
    }

    pub fn failure(call: ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool: call.tool,
            arguments: call.arguments,
            reason: call.reason,
            outcome: ToolOutcome::Error(error.into()),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Result(_))
    }

    pub const fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Result(value) => Some(value),
            ToolOutcome::Error(_) => None,
        }
    }
}

/// Source of remote tools (Strategy pattern)
///
/// Implemented by the MCP client; tests implement it with canned data.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Fetch the provider's tool catalog
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a named tool with arguments
    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value>;
}

/// The tool catalog fetched for one session
#[derive(Clone, Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    pub const fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    /// Get a tool by case-insensitive name
    pub fn find_ignore_case(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check a planned call against the catalog.
    ///
    /// Rewrites the tool name to the catalog's spelling when the model only
    /// got the case wrong.
    pub fn validate(&self, call: &mut ToolCall) -> Result<()> {
        let tool = self
            .find_ignore_case(&call.tool)
            .ok_or_else(|| TerminalError::ToolNotFound(call.tool.clone()))?;

        for param in tool.required_arguments() {
            if !call.arguments.contains_key(param) {
                return Err(TerminalError::ToolValidation(format!(
                    "{}: missing required argument '{param}'",
                    tool.name
                )));
            }
        }

        if call.tool != tool.name {
            call.tool.clone_from(&tool.name);
        }
        Ok(())
    }

    /// Render the catalog for a tool-selection prompt
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::new();

        for tool in &self.tools {
            prompt.push_str(&format!("### {}\n", tool.name));
            if let Some(description) = &tool.description {
                prompt.push_str(description.trim());
                prompt.push('\n');
            }
            if !tool.input_schema.is_null() {
                prompt.push_str("Input schema: ");
                prompt.push_str(&tool.input_schema.to_string());
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt
    }
}
