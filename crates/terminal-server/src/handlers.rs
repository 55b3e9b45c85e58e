//! HTTP Handlers

use axum::{
    extract::State,
    http::StatusCode,
    Form, Json,
};
use chrono::{DateTime, Utc};
use crypto_terminal::{AnalysisOutcome, TradingAnalysis};
use serde::{Deserialize, Serialize};
use terminal_core::{Result, TerminalError};
use terminal_runtime::McpClient;

use crate::state::AppState;

const MAX_SYMBOL_LEN: usize = 15;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_configured: bool,
    pub data_provider_configured: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeForm {
    #[serde(default)]
    pub symbol: String,
}

/// Envelope for `/api/analyze`
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TradingAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AnalyzeResponse {
    fn analysis(analysis: TradingAnalysis) -> Self {
        Self {
            success: true,
            analysis: Some(analysis),
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            analysis: None,
            error: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_configured: state.provider.is_some(),
        data_provider_configured: state.mcp.is_configured(),
    })
}

/// Run a full analysis for the submitted symbol
pub async fn analyze(
    State(state): State<AppState>,
    Form(form): Form<AnalyzeForm>,
) -> (StatusCode, Json<AnalyzeResponse>) {
    let Some(symbol) = normalize_symbol(&form.symbol) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AnalyzeResponse::error(format!(
                "Symbol must be 1-{MAX_SYMBOL_LEN} letters or digits"
            ))),
        );
    };

    match run_analysis(&state, &symbol).await {
        Ok(outcome) => {
            if let AnalysisOutcome::Degraded { reason, .. } = &outcome {
                tracing::warn!(%symbol, %reason, "Returning fallback analysis");
            }
            (StatusCode::OK, Json(AnalyzeResponse::analysis(outcome.into_analysis())))
        }
        Err(e) => {
            if e.is_fatal() {
                tracing::error!(%symbol, error = %e, "Analysis failed");
            } else {
                tracing::warn!(%symbol, error = %e, "Analysis rejected by the data provider");
            }
            (status_for(&e), Json(AnalyzeResponse::error(e.user_message())))
        }
    }
}

/// One data-provider session per analysis, closed on every path
async fn run_analysis(state: &AppState, symbol: &str) -> Result<AnalysisOutcome> {
    let orchestrator = state.orchestrator()?;
    let mut client = McpClient::connect(&state.mcp).await?;

    let outcome = orchestrator.analyze(symbol, &client).await;
    client.disconnect();
    outcome
}

/// Trimmed, upper-cased ticker, or None when it is not 1-15 alphanumerics
fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim();
    let valid = !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| symbol.to_ascii_uppercase())
}

const fn status_for(error: &TerminalError) -> StatusCode {
    match error {
        TerminalError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        TerminalError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        TerminalError::Connection(_)
        | TerminalError::Provider { .. }
        | TerminalError::ModelGateway { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        extract::Query,
        http::{header, Request},
        response::{IntoResponse, Response},
        routing::{get, post},
        Router,
    };
    use crypto_terminal::OrchestratorConfig;
    use futures::{channel::mpsc, StreamExt};
    use serde_json::{json, Value};
    use terminal_core::{Completion, GenerationOptions, LlmProvider, Message};
    use terminal_runtime::McpConfig;
    use tower::ServiceExt;

    use super::*;

    struct ScriptedModel {
        answers: Mutex<VecDeque<Result<Completion>>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _messages: &[Message], _options: &GenerationOptions) -> Result<Completion> {
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TerminalError::Other("script exhausted".into())))
        }
    }

    fn scripted(answers: Vec<Result<&str>>) -> Arc<dyn LlmProvider> {
        Arc::new(ScriptedModel {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(|text| Completion::text(text, "scripted")))
                    .collect(),
            ),
        })
    }

    fn state(provider: Option<Arc<dyn LlmProvider>>, mcp: McpConfig) -> AppState {
        AppState {
            provider,
            mcp: Arc::new(mcp),
            orchestrator: Arc::new(OrchestratorConfig::default()),
        }
    }

    /// Minimal data provider: one Topic tool answering over the event stream
    async fn spawn_data_provider() -> String {
        type Outbox = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

        async fn sse(
            axum::extract::State(stream): axum::extract::State<Outbox>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Response {
            if params.get("key").map(String::as_str) != Some("lc-key") {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            let (tx, rx) = mpsc::unbounded::<String>();
            let _ = tx.unbounded_send("event: endpoint\ndata: /messages?sessionId=t-1\n\n".into());
            *stream.lock().unwrap() = Some(tx);
            let body = Body::from_stream(rx.map(Ok::<_, Infallible>));
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }

        async fn messages(
            axum::extract::State(stream): axum::extract::State<Outbox>,
            Json(request): Json<Value>,
        ) -> StatusCode {
            let result = match request["method"].as_str() {
                Some("tools/list") => json!({"tools": [{
                    "name": "Topic",
                    "inputSchema": {"type": "object", "properties": {"topic": {}}, "required": ["topic"]}
                }]}),
                _ => json!({"content": [{"type": "text", "text": "Price: $3120.50\nGalaxy Score: 66"}]}),
            };
            let id = request["id"].clone();
            let reply = json!({"jsonrpc": "2.0", "id": id, "result": result});
            if let Some(tx) = stream.lock().unwrap().as_ref() {
                let _ = tx.unbounded_send(format!("data: {reply}\n\n"));
            }
            StatusCode::ACCEPTED
        }

        let app = Router::new()
            .route("/sse", get(sse))
            .route("/messages", post(messages))
            .with_state(Outbox::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/sse")
    }

    async fn data_provider_config() -> McpConfig {
        McpConfig::new(spawn_data_provider().await, "lc-key")
            .with_connect_timeout(Duration::from_secs(5))
            .with_request_timeout(Duration::from_secs(5))
    }

    async fn post_symbol(state: AppState, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = crate::app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" sol "), Some("SOL".into()));
        assert_eq!(normalize_symbol("1inch"), Some("1INCH".into()));
        assert_eq!(normalize_symbol(""), None);
        assert_eq!(normalize_symbol("BTC-USD"), None);
        assert_eq!(normalize_symbol("ABCDEFGHIJKLMNOP"), None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&TerminalError::Config("x".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&TerminalError::Timeout("x".into())), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(&TerminalError::ModelGateway { status: 500, message: "x".into() }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_for(&TerminalError::Other("x".into())), StatusCode::INTERNAL_SERVER_ERROR);

        // Provider envelopes are not fatal to a session but still end this request
        let rejected = TerminalError::Provider { code: -32001, message: "upstream unavailable".into() };
        assert!(!rejected.is_fatal());
        assert_eq!(status_for(&rejected), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_health_reports_configuration() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = crate::app(state(None, McpConfig::default()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_configured"], false);
        assert_eq!(body["data_provider_configured"], false);
    }

    #[tokio::test]
    async fn test_invalid_symbol_is_rejected() {
        let (status, body) = post_symbol(state(None, McpConfig::default()), "symbol=%24%24%24").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = post_symbol(state(None, McpConfig::default()), "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_keys_fail_the_request() {
        let (status, body) = post_symbol(state(None, McpConfig::default()), "symbol=btc").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
        assert!(body.get("analysis").is_none());

        let provider = scripted(vec![]);
        let (status, body) = post_symbol(state(Some(provider), McpConfig::default()), "symbol=btc").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("LUNARCRUSH_API_KEY"));
    }

    #[tokio::test]
    async fn test_full_analysis_over_http() {
        let provider = scripted(vec![
            Ok(r#"[{"tool": "topic", "args": {"topic": "eth"}, "reason": "metrics"}]"#),
            Ok(r#"{"recommendation": "buy", "confidence": 71, "social_sentiment": "bullish"}"#),
        ]);
        let mcp = data_provider_config().await;

        let (status, body) = post_symbol(state(Some(provider), mcp), "symbol=eth").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let analysis = &body["analysis"];
        assert_eq!(analysis["symbol"], "ETH");
        assert_eq!(analysis["recommendation"], "BUY");
        assert_eq!(analysis["confidence"], 71);
        assert_eq!(analysis["degraded"], false);
        assert_eq!(analysis["key_metrics"]["price"], 3120.5);
        assert_eq!(analysis["key_metrics"]["galaxy_score"], 66.0);
    }

    #[tokio::test]
    async fn test_model_failure_is_a_bad_gateway() {
        let provider = scripted(vec![
            Ok(r#"[{"tool": "Topic", "args": {"topic": "eth"}}]"#),
            Err(TerminalError::ModelGateway { status: 500, message: "internal".into() }),
        ]);
        let mcp = data_provider_config().await;

        let (status, body) = post_symbol(state(Some(provider), mcp), "symbol=ETH").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("500"));
        assert!(body.get("analysis").is_none());
    }
}
