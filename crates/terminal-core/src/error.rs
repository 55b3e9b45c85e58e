//! Error Types

use thiserror::Error;

/// Result type alias for terminal operations
pub type Result<T> = std::result::Result<T, TerminalError>;

/// Terminal error types
#[derive(Error, Debug)]
pub enum TerminalError {
    /// Stream/session establishment or transport failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single operation exceeded its time bound
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Structured error envelope returned by the data provider
    #[error("Provider error {code}: {message}")]
    Provider { code: i64, message: String },

    /// Non-success response from the generative model endpoint
    #[error("Model gateway error (HTTP {status}): {message}")]
    ModelGateway { status: u16, message: String },

    /// Model output did not contain recoverable structured data
    #[error("Parse error: {0}")]
    Parse(String),

    /// Planned tool is not in the provider's catalog
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Planned tool call failed catalog validation
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Configuration error (missing API keys, bad URLs)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl TerminalError {
    /// Whether this error aborts the whole analysis request.
    ///
    /// Parse and tool-level errors degrade the result instead.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Timeout(_)
                | Self::ModelGateway { .. }
                | Self::Config(_)
                | Self::Other(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(msg) => format!("Could not reach the market data provider: {msg}"),
            Self::Timeout(what) => format!("The request timed out while waiting for {what}."),
            Self::Provider { message, .. } => format!("The market data provider returned an error: {message}"),
            Self::ModelGateway { status, .. } => {
                format!("The AI service failed with HTTP status {status}. Please try again.")
            }
            Self::Config(msg) => format!("The terminal is not configured: {msg}"),
            Self::ToolNotFound(name) => format!("The data tool '{name}' is not available."),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for TerminalError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_split() {
        assert!(TerminalError::Connection("refused".into()).is_fatal());
        assert!(TerminalError::ModelGateway { status: 500, message: "boom".into() }.is_fatal());
        assert!(!TerminalError::Parse("no json".into()).is_fatal());
        assert!(!TerminalError::Provider { code: -32000, message: "bad".into() }.is_fatal());
    }

    #[test]
    fn test_user_message_mentions_status() {
        let err = TerminalError::ModelGateway { status: 503, message: "overloaded".into() };
        assert!(err.user_message().contains("503"));
    }
}
