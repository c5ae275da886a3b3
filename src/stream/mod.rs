//! Building blocks for consuming a Chat Completions SSE body.

pub mod line_reader;
pub mod sse;
pub mod tool_calls;

pub use line_reader::{LineReader, MAX_LINE_BYTES};
pub use sse::{SseEvent, ToolCallDelta, is_done_sentinel, parse_line};
pub use tool_calls::{DeltaOutcome, ToolCallAccumulator};
