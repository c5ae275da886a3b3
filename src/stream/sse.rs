//! Classification of Chat Completions SSE lines into stream events.
//!
//! Providers disagree on where `finish_reason`, trailing `content` and `usage`
//! land in the final chunk, so every observed placement is accepted.

use serde_json::Value;

use crate::models::TokenUsage;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";
const ERROR_MARKER: &str = "\"error\"";

/// One semantic event parsed from a single SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Content(String),
    Reasoning(String),
    ToolCallDelta(ToolCallDelta),
    /// A usage-only chunk that arrived before the stream terminated.
    Usage(TokenUsage),
    Done(Option<TokenUsage>),
    ApiError(String),
    Skip,
}

/// Fragment of a tool call. `id` is only present on the fragment that opens
/// a new call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub function_name: Option<String>,
    pub function_arguments: Option<String>,
}

/// Classify one line (already stripped of its terminator).
#[must_use]
pub fn parse_line(line: &str) -> SseEvent {
    if line.is_empty() || line.starts_with(':') {
        return SseEvent::Skip;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseEvent::Skip;
    };
    if is_done_payload(payload) {
        return SseEvent::Done(None);
    }

    let chunk: Value = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(_) if payload.contains(ERROR_MARKER) => {
            return SseEvent::ApiError(payload.to_string());
        }
        Err(_) => return SseEvent::Skip,
    };
    parse_chunk(&chunk)
}

/// Whether the line is the `data: [DONE]` terminator, as opposed to a chunk
/// that merely carries a `finish_reason`.
#[must_use]
pub fn is_done_sentinel(line: &str) -> bool {
    line.strip_prefix(DATA_PREFIX).is_some_and(is_done_payload)
}

fn is_done_payload(payload: &str) -> bool {
    payload.trim() == DONE_SENTINEL
}

/// Classify an already-decoded chunk payload.
#[must_use]
pub fn parse_chunk(chunk: &Value) -> SseEvent {
    if let Some(message) = error_message(chunk) {
        return SseEvent::ApiError(message.to_string());
    }

    let usage = chunk.get("usage").and_then(TokenUsage::from_value);
    let choice = match chunk.get("choices").and_then(Value::as_array) {
        Some(choices) => choices.first().filter(|choice| choice.is_object()),
        None => None,
    };
    let Some(choice) = choice else {
        return usage.map_or(SseEvent::Skip, SseEvent::Usage);
    };

    let delta = choice.get("delta");
    let content = delta
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty());

    let finish_reason = choice.get("finish_reason").and_then(Value::as_str);
    if matches!(finish_reason, Some("stop" | "tool_calls")) {
        // Content that rides on the terminating chunk must not be lost; the
        // stream still ends on the following `[DONE]` or EOF.
        return match content {
            Some(text) => SseEvent::Content(text.to_string()),
            None => SseEvent::Done(usage),
        };
    }

    let Some(delta) = delta else {
        return SseEvent::Skip;
    };

    // Only the first element is read. A chunk carrying fragments of several
    // calls at once loses all but the first.
    if let Some(call) = delta
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .filter(|call| call.is_object())
    {
        return SseEvent::ToolCallDelta(parse_tool_call_delta(call));
    }

    if let Some(text) = content {
        return SseEvent::Content(text.to_string());
    }

    match delta
        .get("reasoning_content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
    {
        Some(reasoning) => SseEvent::Reasoning(reasoning.to_string()),
        None => SseEvent::Skip,
    }
}

/// `error.message` of a provider error object, if present.
#[must_use]
pub fn error_message(payload: &Value) -> Option<&str> {
    payload
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
}

fn parse_tool_call_delta(call: &Value) -> ToolCallDelta {
    let function = call.get("function");
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);
    ToolCallDelta {
        index: call
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|index| u32::try_from(index).ok())
            .unwrap_or(0),
        id: text(call.get("id")),
        function_name: text(function.and_then(|f| f.get("name"))),
        function_arguments: text(function.and_then(|f| f.get("arguments"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_delta() {
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#),
            SseEvent::Content("Hello".to_string())
        );
    }

    #[test]
    fn done_sentinel() {
        assert_eq!(parse_line("data: [DONE]"), SseEvent::Done(None));
    }

    #[test]
    fn done_sentinel_is_distinct_from_finish_reason() {
        assert!(is_done_sentinel("data: [DONE]"));
        assert!(is_done_sentinel("data: [DONE] "));
        assert!(!is_done_sentinel(
            r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#
        ));
        assert!(!is_done_sentinel("[DONE]"));
    }

    #[test]
    fn blank_comment_and_foreign_lines_skip() {
        assert_eq!(parse_line(""), SseEvent::Skip);
        assert_eq!(parse_line(": keep-alive"), SseEvent::Skip);
        assert_eq!(parse_line("event: message"), SseEvent::Skip);
        assert_eq!(parse_line("data:{\"x\":1}"), SseEvent::Skip);
    }

    #[test]
    fn finish_reason_stop_without_content_is_done() {
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            SseEvent::Done(None)
        );
    }

    #[test]
    fn finish_reason_carries_usage() {
        let event = parse_line(
            r#"data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        );
        assert_eq!(
            event,
            SseEvent::Done(Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }))
        );
    }

    #[test]
    fn content_on_finishing_chunk_is_emitted_first() {
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"content":"bye"},"finish_reason":"stop"}]}"#),
            SseEvent::Content("bye".to_string())
        );
    }

    #[test]
    fn other_finish_reasons_fall_through_to_delta() {
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"content":"cut"},"finish_reason":"length"}]}"#),
            SseEvent::Content("cut".to_string())
        );
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"length"}]}"#),
            SseEvent::Skip
        );
    }

    #[test]
    fn reasoning_delta() {
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"content":"","reasoning_content":"hmm"}}]}"#),
            SseEvent::Reasoning("hmm".to_string())
        );
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"content":null,"reasoning_content":""}}]}"#),
            SseEvent::Skip
        );
    }

    #[test]
    fn tool_call_delta_opening_fragment() {
        assert_eq!(
            parse_line(
                r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","type":"function","function":{"name":"read_file","arguments":""}}]}}]}"#
            ),
            SseEvent::ToolCallDelta(ToolCallDelta {
                index: 0,
                id: Some("call_abc".to_string()),
                function_name: Some("read_file".to_string()),
                function_arguments: Some(String::new()),
            })
        );
    }

    #[test]
    fn tool_call_delta_continuation_fragment() {
        assert_eq!(
            parse_line(
                r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":null,"function":{"arguments":"{\"pa"}}]}}]}"#
            ),
            SseEvent::ToolCallDelta(ToolCallDelta {
                index: 1,
                id: None,
                function_name: None,
                function_arguments: Some("{\"pa".to_string()),
            })
        );
    }

    #[test]
    fn tool_calls_take_precedence_over_content() {
        let event = parse_line(
            r#"data: {"choices":[{"delta":{"content":"x","tool_calls":[{"index":0,"function":{"arguments":"1"}}]}}]}"#,
        );
        assert!(matches!(event, SseEvent::ToolCallDelta(_)));
    }

    #[test]
    fn missing_or_malformed_choices_skip() {
        assert_eq!(parse_line(r#"data: {"id":"x"}"#), SseEvent::Skip);
        assert_eq!(parse_line(r#"data: {"choices":[]}"#), SseEvent::Skip);
        assert_eq!(parse_line(r#"data: {"choices":[1]}"#), SseEvent::Skip);
        assert_eq!(parse_line(r#"data: {"choices":[{}]}"#), SseEvent::Skip);
    }

    #[test]
    fn usage_only_chunk() {
        assert_eq!(
            parse_line(r#"data: {"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#),
            SseEvent::Usage(TokenUsage {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
            })
        );
        assert_eq!(
            parse_line(r#"data: {"choices":[],"usage":null}"#),
            SseEvent::Skip
        );
    }

    #[test]
    fn in_stream_error_object() {
        assert_eq!(
            parse_line(r#"data: {"error":{"message":"overloaded","type":"server_error"}}"#),
            SseEvent::ApiError("overloaded".to_string())
        );
    }

    #[test]
    fn unparseable_payloads() {
        assert_eq!(
            parse_line(r#"data: {"error": truncated"#),
            SseEvent::ApiError(r#"{"error": truncated"#.to_string())
        );
        assert_eq!(parse_line("data: not json"), SseEvent::Skip);
    }
}
