//! Request Correlation
//!
//! Ties response frames arriving on the event stream to the requests that
//! were POSTed separately. Each pending entry is removed exactly once: by
//! its response, its timeout, a send failure, or session teardown.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::Value;
use terminal_core::{Result, TerminalError};
use tokio::sync::oneshot;

use super::protocol::JsonRpcResponse;

type Completion = oneshot::Sender<Result<Value>>;

struct PendingEntry {
    created_at: DateTime<Utc>,
    completion: Completion,
}

/// Receiving half of a registered request
pub struct PendingResponse {
    rx: oneshot::Receiver<Result<Value>>,
}

/// In-flight request table for one session
pub struct RequestCorrelator {
    pending: Mutex<HashMap<String, PendingEntry>>,
    timeout: Duration,
}

impl RequestCorrelator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id and register a pending entry for it
    pub fn register(&self) -> (String, PendingResponse) {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table();

        let mut id = next_request_id();
        while table.contains_key(&id) {
            id = next_request_id();
        }

        table.insert(
            id.clone(),
            PendingEntry {
                created_at: Utc::now(),
                completion: tx,
            },
        );
        (id, PendingResponse { rx })
    }

    /// Await the response for `id`, bounded by the request timeout
    pub async fn wait(&self, id: &str, pending: PendingResponse) -> Result<Value> {
        match tokio::time::timeout(self.timeout, pending.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(TerminalError::Connection(
                "session closed before the response arrived".into(),
            )),
            Err(_) => {
                self.cancel(id);
                tracing::warn!(request_id = id, timeout_ms = self.timeout.as_millis(), "Request timed out");
                Err(TerminalError::Timeout(format!(
                    "response to request {id} after {}s",
                    self.timeout.as_secs_f32()
                )))
            }
        }
    }

    /// Complete the pending request matching this response.
    ///
    /// Returns `false` for unknown ids, including late responses whose
    /// request already timed out.
    pub fn resolve(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id_key() else {
            return false;
        };

        let Some(entry) = self.table().remove(&id) else {
            tracing::debug!(request_id = %id, "Dropping response for unknown or expired request");
            return false;
        };

        let elapsed_ms = (Utc::now() - entry.created_at).num_milliseconds();
        tracing::debug!(request_id = %id, elapsed_ms, "Resolved request");

        // The waiter may have given up between removal and send.
        let _ = entry.completion.send(response.into_outcome());
        true
    }

    /// Forget a pending request without completing it
    pub fn cancel(&self, id: &str) -> bool {
        self.table().remove(id).is_some()
    }

    /// Fail every pending request, e.g. when the stream closes
    pub fn fail_all(&self, reason: &str) {
        let drained: Vec<_> = self.table().drain().collect();
        if !drained.is_empty() {
            tracing::warn!(pending = drained.len(), reason, "Failing pending requests");
        }
        for (_, entry) in drained {
            let _ = entry
                .completion
                .send(Err(TerminalError::Connection(reason.to_string())));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.table().len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.table().contains_key(id)
    }
}

/// `<unix millis>-<8 random alphanumerics>`; unique, not cryptographic
fn next_request_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}
