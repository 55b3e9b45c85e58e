//! MCP Streaming Client
//!
//! Client for the data provider's tool-calling protocol: a long-lived SSE
//! stream delivers responses, while requests are POSTed separately to an
//! endpoint announced on that stream.
//!
//! ```text
//!   GET /sse?key=..  ─────────────▶  event: endpoint / data: /messages?sessionId=..
//!                                    data: {"jsonrpc":"2.0","id":..,"result":..}
//!   POST /messages?sessionId=..  ──▶  202 Accepted (result arrives on the stream)
//! ```
//!
//! `McpSession` owns the stream and the `RequestCorrelator`; `McpClient`
//! layers the `tools/list` and `tools/call` methods on top.

mod client;
mod config;
mod correlator;
mod frame;
mod protocol;
mod session;

pub use client::McpClient;
pub use config::McpConfig;
pub use correlator::{PendingResponse, RequestCorrelator};
pub use frame::{Frame, FrameDispatcher};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, RpcError};
pub use session::{McpSession, SessionInfo};
