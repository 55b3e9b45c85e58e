//! Streaming Session
//!
//! Opens the provider's event stream, waits for the message endpoint
//! announcement, and keeps a reader task demultiplexing response frames
//! into the `RequestCorrelator` until the session is dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, StatusCode, Url};
use serde_json::Value;
use terminal_core::{Result, TerminalError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use super::config::McpConfig;
use super::correlator::RequestCorrelator;
use super::frame::FrameDispatcher;
use super::protocol::JsonRpcRequest;

const MAX_FRAME_BYTES: usize = 1024 * 1024;
const SESSION_HEADER: &str = "mcp-session-id";

/// Identity of an open session
#[derive(Clone, Debug)]
pub struct SessionInfo {
    /// Server-issued id (header, or the endpoint's `sessionId` parameter)
    pub session_id: Option<String>,

    /// Absolute URL requests are POSTed to
    pub message_endpoint: Url,

    pub opened_at: DateTime<Utc>,
}

/// One streaming connection to the data provider.
///
/// Only constructed once the message endpoint is known, so every request
/// has somewhere to go. Dropping the session tears the stream down.
pub struct McpSession {
    info: SessionInfo,
    http: reqwest::Client,
    correlator: Arc<RequestCorrelator>,
    reader: Option<JoinHandle<()>>,
}

impl McpSession {
    /// Open the event stream and wait for the endpoint announcement
    pub async fn connect(config: &McpConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TerminalError::Config("LUNARCRUSH_API_KEY is not set".into()))?;

        let mut sse_url = Url::parse(&config.sse_url)
            .map_err(|e| TerminalError::Config(format!("invalid stream URL '{}': {e}", config.sse_url)))?;
        sse_url.query_pairs_mut().append_pair("key", api_key);

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TerminalError::Config(format!("HTTP client: {e}")))?;

        let deadline = Instant::now() + config.connect_timeout;
        let timed_out = || {
            TerminalError::Timeout(format!(
                "session endpoint after {}s",
                config.connect_timeout.as_secs_f32()
            ))
        };

        let response = tokio::time::timeout_at(
            deadline,
            http.get(sse_url.clone())
                .header(header::ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| TerminalError::Connection(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TerminalError::Connection(format!(
                "event stream returned HTTP {status}"
            )));
        }

        let header_session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let correlator = Arc::new(RequestCorrelator::new(config.request_timeout));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let dispatcher = FrameDispatcher::new(endpoint_tx, correlator.clone());
        let reader = tokio::spawn(pump(response, dispatcher));

        let path = match tokio::time::timeout_at(deadline, endpoint_rx).await {
            Ok(Ok(path)) => path,
            Ok(Err(_)) => {
                reader.abort();
                return Err(TerminalError::Connection(
                    "event stream closed before announcing a message endpoint".into(),
                ));
            }
            Err(_) => {
                reader.abort();
                return Err(timed_out());
            }
        };

        let message_endpoint = sse_url
            .join(&path)
            .map_err(|e| TerminalError::Connection(format!("invalid message endpoint '{path}': {e}")))?;

        let session_id = header_session.or_else(|| {
            message_endpoint
                .query_pairs()
                .find(|(k, _)| k == "sessionId" || k == "session_id")
                .map(|(_, v)| v.into_owned())
        });

        tracing::info!(
            session_id = session_id.as_deref().unwrap_or("-"),
            endpoint = message_endpoint.path(),
            "MCP session opened"
        );

        Ok(Self {
            info: SessionInfo {
                session_id,
                message_endpoint,
                opened_at: Utc::now(),
            },
            http,
            correlator,
            reader: Some(reader),
        })
    }

    pub const fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    /// False once disconnected or once the event stream has ended
    pub fn is_connected(&self) -> bool {
        self.reader.as_ref().is_some_and(|reader| !reader.is_finished())
    }

    /// Send a JSON-RPC request and await its streamed response
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(TerminalError::Connection("session is closed".into()));
        }

        let (id, pending) = self.correlator.register();
        let body = JsonRpcRequest::new(&id, method, params);

        tracing::debug!(request_id = %id, method, "Submitting request");

        let sent = self
            .http
            .post(self.info.message_endpoint.clone())
            .timeout(self.correlator.timeout())
            .json(&body)
            .send()
            .await;

        match sent {
            Ok(response) if matches!(response.status(), StatusCode::OK | StatusCode::ACCEPTED) => {}
            Ok(response) => {
                self.correlator.cancel(&id);
                return Err(TerminalError::Connection(format!(
                    "{method} submission returned HTTP {}",
                    response.status()
                )));
            }
            Err(e) => {
                self.correlator.cancel(&id);
                return Err(TerminalError::Connection(e.without_url().to_string()));
            }
        }

        self.correlator.wait(&id, pending).await
    }

    /// Tear the stream down and fail anything still pending; idempotent
    pub fn disconnect(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            self.correlator.fail_all("session closed");
            tracing::info!(
                session_id = self.info.session_id.as_deref().unwrap_or("-"),
                open_ms = (Utc::now() - self.info.opened_at).num_milliseconds(),
                "MCP session closed"
            );
        }
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Read the stream line by line until it ends
async fn pump(response: reqwest::Response, mut dispatcher: FrameDispatcher) {
    let bytes = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other));
    let mut lines = FramedRead::new(
        StreamReader::new(bytes),
        LinesCodec::new_with_max_length(MAX_FRAME_BYTES),
    );

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                dispatcher.dispatch(&line);
            }
            // The codec discards up to the next newline; only that frame is lost
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                tracing::warn!(max_bytes = MAX_FRAME_BYTES, "Dropping oversized stream frame");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Event stream read failed");
                break;
            }
        }
    }

    tracing::debug!("Event stream ended");
    dispatcher.correlator().fail_all("event stream closed");
}
