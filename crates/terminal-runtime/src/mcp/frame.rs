//! Event-stream line dispatch

use std::sync::Arc;

use tokio::sync::oneshot;

use super::correlator::RequestCorrelator;
use super::protocol::JsonRpcResponse;

const JSONRPC_MARKER: &str = "\"jsonrpc\"";

/// What a single stream line turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Message-submission path announced (first occurrence only)
    Endpoint(String),
    /// JSON-RPC response; `matched` is false for unknown or late ids
    Response { matched: bool },
    /// Response-looking payload that failed to parse
    Malformed,
    /// Comments, heartbeats, event names, blank separators
    Ignored,
}

/// Classifies stream lines and routes them to their consumers
pub struct FrameDispatcher {
    endpoint: Option<oneshot::Sender<String>>,
    endpoint_seen: bool,
    current_event: Option<String>,
    correlator: Arc<RequestCorrelator>,
}

impl FrameDispatcher {
    pub fn new(endpoint: oneshot::Sender<String>, correlator: Arc<RequestCorrelator>) -> Self {
        Self {
            endpoint: Some(endpoint),
            endpoint_seen: false,
            current_event: None,
            correlator,
        }
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    /// Handle one complete line (without its terminator)
    pub fn dispatch(&mut self, line: &str) -> Frame {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            self.current_event = None;
            return Frame::Ignored;
        }
        if line.starts_with(':') {
            return Frame::Ignored;
        }
        if let Some(event) = line.strip_prefix("event:") {
            self.current_event = Some(event.trim().to_string());
            return Frame::Ignored;
        }

        let Some(data) = line.strip_prefix("data:") else {
            return Frame::Ignored;
        };
        let data = data.trim();

        if self.is_endpoint_announcement(data) {
            if self.endpoint_seen {
                tracing::debug!(endpoint = data, "Ignoring repeated endpoint announcement");
                return Frame::Ignored;
            }
            self.endpoint_seen = true;
            if let Some(tx) = self.endpoint.take() {
                let _ = tx.send(data.to_string());
            }
            tracing::debug!(endpoint = data, "Message endpoint announced");
            return Frame::Endpoint(data.to_string());
        }

        if data.contains(JSONRPC_MARKER) {
            return match serde_json::from_str::<JsonRpcResponse>(data) {
                Ok(response) => Frame::Response {
                    matched: self.correlator.resolve(response),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed response frame");
                    Frame::Malformed
                }
            };
        }

        Frame::Ignored
    }

    fn is_endpoint_announcement(&self, data: &str) -> bool {
        self.current_event.as_deref() == Some("endpoint")
            || data.starts_with('/')
            || data.starts_with("http://")
            || data.starts_with("https://")
    }
}
