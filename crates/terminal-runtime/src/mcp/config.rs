//! MCP session configuration

use std::time::Duration;

const DEFAULT_SSE_URL: &str = "https://lunarcrush.ai/sse";

/// Data provider connection settings
#[derive(Clone, Debug)]
pub struct McpConfig {
    /// Event-stream URL; the API key is appended as the `key` query parameter
    pub sse_url: String,

    /// Provider API key (`None` makes every connect fail with a config error)
    pub api_key: Option<String>,

    /// Bound on opening the stream and receiving the endpoint announcement
    pub connect_timeout: Duration,

    /// Bound on each request/response round-trip
    pub request_timeout: Duration,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            sse_url: DEFAULT_SSE_URL.into(),
            api_key: None,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl McpConfig {
    pub fn new(sse_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            sse_url: sse_url.into(),
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Read `LUNARCRUSH_API_KEY`, `LUNARCRUSH_MCP_URL`,
    /// `MCP_CONNECT_TIMEOUT_SECS` and `MCP_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secs = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(fallback, Duration::from_secs)
        };

        Self {
            sse_url: std::env::var("LUNARCRUSH_MCP_URL").unwrap_or(defaults.sse_url),
            api_key: std::env::var("LUNARCRUSH_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            connect_timeout: secs("MCP_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            request_timeout: secs("MCP_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
        }
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
