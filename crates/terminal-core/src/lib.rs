//! # terminal-core
//!
//! Contracts shared by the trading terminal: a provider-agnostic model
//! gateway and a remote tool source.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TradingOrchestrator                       │
//! │  ┌─────────────┐  ┌─────────────────┐  ┌─────────────────┐  │
//! │  │  Two-phase  │  │   ToolSource    │  │   LlmProvider   │  │
//! │  │   driver    │──│  (MCP session)  │──│    (Gemini)     │  │
//! │  └─────────────┘  └─────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both traits are seams: the runtime crate provides the network-backed
//! implementations and tests provide scripted ones.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

pub use error::{Result, TerminalError};
pub use message::{Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use tool::{ToolCall, ToolCatalog, ToolDescriptor, ToolOutcome, ToolResult, ToolSource};
