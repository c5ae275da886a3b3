//! Streaming completion engine for OpenAI-compatible chat endpoints.
//!
//! A conversation ([`models::ChatMessage`]) is serialized by [`request`],
//! sent by [`client::ChatClient`], and the SSE body is taken apart by the
//! pieces in [`stream`]: a fragmentation-safe line reader, a per-line event
//! parser and a tool-call accumulator.

pub mod client;
pub mod config;
pub mod error;
pub mod error_taxonomy;
pub mod hooks;
pub mod logging;
pub mod models;
pub mod request;
pub mod stream;
pub mod terminal;

pub use client::ChatClient;
pub use config::{Config, EngineConfig};
pub use error::StreamError;
pub use hooks::{CancelCheck, DisplayEvent, NeverCancel, SilentSink, StreamSink};
pub use models::{
    ChatMessage, CompletionResponse, CompletionResult, FunctionCall, Role, TokenUsage, ToolCall,
    ToolDef,
};
