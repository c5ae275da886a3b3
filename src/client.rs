//! Streaming client for OpenAI-compatible Chat Completions endpoints.
//!
//! One call to [`ChatClient::stream_completion`] sends the conversation, reads
//! the SSE body line by line and returns either the streamed text or the tool
//! calls the model asked for.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::StreamError;
use crate::hooks::{CancelCheck, DisplayEvent, NeverCancel, SilentSink, StreamSink};
use crate::logging;
use crate::models::{ChatMessage, CompletionResponse, CompletionResult, TokenUsage};
use crate::request::{RequestParams, build_request_body};
use crate::stream::sse::error_message;
use crate::stream::{
    DeltaOutcome, LineReader, SseEvent, ToolCallAccumulator, is_done_sentinel, parse_line,
};

/// Most bytes read from an error body.
pub const ERROR_BODY_CAP: usize = 64 * 1024;

// === Types ===

/// Client bound to one resolved endpoint configuration.
#[must_use]
#[derive(Clone)]
pub struct ChatClient {
    http_client: reqwest::Client,
    config: EngineConfig,
}

/// Per-invocation buffers. Dropped without side effects if the call fails.
#[derive(Default)]
struct StreamState {
    response: String,
    reasoning: String,
    in_reasoning: bool,
    /// A finish chunk arrived without usage; only a trailing usage chunk is
    /// still of interest.
    awaiting_usage: bool,
    tool_calls: ToolCallAccumulator,
    usage: Option<TokenUsage>,
}

enum Step {
    Continue,
    Finished,
}

// === ChatClient ===

impl ChatClient {
    pub fn new(config: EngineConfig) -> Result<Self, StreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|err| StreamError::ConnectionFailed(err.to_string()))?;

        logging::debug(format!("Chat completions URL: {}", config.completions_url));
        Ok(Self {
            http_client,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stream a completion, reporting output to `sink` and polling `cancel`
    /// before each line.
    ///
    /// Cancellation is not an error: the text accumulated so far comes back
    /// with `cancelled` set.
    pub async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        sink: &mut dyn StreamSink,
        cancel: &dyn CancelCheck,
    ) -> Result<CompletionResult, StreamError> {
        let response = self.send(messages).await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(http_error(status, response).await);
        }

        let mut reader = LineReader::new(Box::pin(response.bytes_stream()));
        drive_stream(&mut reader, sink, cancel).await
    }

    /// Same state machine with every side effect and the cancellation poll
    /// switched off.
    pub async fn complete_silent(
        &self,
        messages: &[ChatMessage],
    ) -> Result<CompletionResult, StreamError> {
        self.stream_completion(messages, &mut SilentSink, &NeverCancel)
            .await
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<reqwest::Response, StreamError> {
        let params = RequestParams {
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: true,
        };
        let body = build_request_body(
            &self.config.model,
            messages,
            params,
            Some(&self.config.tools),
        )
        .map_err(|err| StreamError::RequestFailed(format!("failed to encode request: {err}")))?;

        logging::debug(format!(
            "POST {} model={} messages={} tools={} bytes={}",
            self.config.completions_url,
            self.config.model,
            messages.len(),
            self.config.tools.len(),
            body.len()
        ));

        let mut request = self
            .http_client
            .post(&self.config.completions_url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .header(ACCEPT_ENCODING, "identity")
            .body(body);
        if let Some(api_key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(api_key);
        }

        Ok(request.send().await?)
    }
}

// === Stream Driver ===

/// Run the per-line state machine over an SSE body.
pub async fn drive_stream<S, E>(
    reader: &mut LineReader<S>,
    sink: &mut dyn StreamSink,
    cancel: &dyn CancelCheck,
) -> Result<CompletionResult, StreamError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut state = StreamState::default();
    let mut seen_payload = false;

    while let Some(line) = next_line(reader).await? {
        if cancel.should_cancel() {
            logging::info("Stream cancelled by caller");
            return Ok(state.cancelled());
        }

        if !seen_payload {
            if line.trim().is_empty() {
                continue;
            }
            seen_payload = true;
            // Some providers answer with a bare JSON error object and status 200.
            if line.trim_start().starts_with('{') {
                return Err(bare_json_error(line, reader).await);
            }
        }

        if is_done_sentinel(&line) {
            break;
        }
        match state.apply(parse_line(&line), sink)? {
            Step::Continue => {}
            Step::Finished => break,
        }
    }

    Ok(state.finish(sink))
}

async fn next_line<S, E>(reader: &mut LineReader<S>) -> Result<Option<String>, StreamError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    reader
        .next_line()
        .await
        .map_err(|err| StreamError::RequestFailed(format!("stream read error: {err}")))
}

impl StreamState {
    fn apply(&mut self, event: SseEvent, sink: &mut dyn StreamSink) -> Result<Step, StreamError> {
        if self.awaiting_usage {
            return Ok(match event {
                SseEvent::Usage(usage) | SseEvent::Done(Some(usage)) => {
                    self.usage = Some(usage);
                    Step::Finished
                }
                _ => Step::Continue,
            });
        }

        match event {
            SseEvent::Reasoning(text) => {
                if !self.in_reasoning {
                    self.in_reasoning = true;
                    sink.on_display(DisplayEvent::ReasoningStart);
                }
                sink.on_reasoning(&text);
                self.reasoning.push_str(&text);
            }
            SseEvent::Content(text) => {
                self.close_reasoning(sink);
                sink.on_token(&text);
                self.response.push_str(&text);
            }
            SseEvent::ToolCallDelta(delta) => {
                if let DeltaOutcome::Opened { name } = self.tool_calls.push(delta) {
                    self.close_reasoning(sink);
                    sink.on_display(DisplayEvent::ToolCallStarted { name });
                }
            }
            SseEvent::Usage(usage) => self.usage = Some(usage),
            SseEvent::Done(usage) => {
                if usage.is_some() {
                    self.usage = usage;
                }
                if self.usage.is_some() {
                    return Ok(Step::Finished);
                }
                // With `include_usage`, OpenAI sends usage on a separate
                // chunk between the finish chunk and `[DONE]`.
                self.awaiting_usage = true;
            }
            SseEvent::ApiError(message) => {
                logging::warn(format!("Provider reported an error mid-stream: {message}"));
                return Err(StreamError::ApiError(message));
            }
            SseEvent::Skip => {}
        }
        Ok(Step::Continue)
    }

    fn close_reasoning(&mut self, sink: &mut dyn StreamSink) {
        if self.in_reasoning {
            self.in_reasoning = false;
            sink.on_display(DisplayEvent::ReasoningEnd);
        }
    }

    /// Tool calls, when any were opened, replace the narration text.
    fn finish(mut self, sink: &mut dyn StreamSink) -> CompletionResult {
        self.close_reasoning(sink);
        let response = if self.tool_calls.is_empty() {
            CompletionResponse::Text(self.response)
        } else {
            CompletionResponse::ToolCalls(self.tool_calls.finish())
        };
        CompletionResult {
            response,
            usage: self.usage,
            reasoning: non_empty(self.reasoning),
            cancelled: false,
        }
    }

    /// Partial result after cancellation. Open tool calls may hold truncated
    /// argument JSON, so only the text survives.
    fn cancelled(self) -> CompletionResult {
        if !self.tool_calls.is_empty() {
            logging::info(format!(
                "Discarding {} unfinished tool call(s) after cancellation",
                self.tool_calls.len()
            ));
        }
        CompletionResult {
            response: CompletionResponse::Text(self.response),
            usage: self.usage,
            reasoning: non_empty(self.reasoning),
            cancelled: true,
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

// === Error Helpers ===

async fn http_error(status: StatusCode, response: reqwest::Response) -> StreamError {
    let body = read_capped(response.bytes_stream(), ERROR_BODY_CAP).await;
    let text = String::from_utf8_lossy(&body);
    let message = extract_error_message(&text).unwrap_or_else(|| {
        let raw = text.trim();
        if raw.is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            raw.to_string()
        }
    });
    logging::warn(format!("HTTP {} from chat completions: {message}", status.as_u16()));
    StreamError::HttpError {
        status: status.as_u16(),
        message,
    }
}

async fn read_capped<S, E>(stream: S, cap: usize) -> Vec<u8>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut body = Vec::new();
    while body.len() < cap {
        match stream.next().await {
            Some(Ok(chunk)) => {
                let room = cap - body.len();
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            }
            Some(Err(_)) | None => break,
        }
    }
    body
}

async fn bare_json_error<S, E>(first: String, reader: &mut LineReader<S>) -> StreamError
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let mut body = first;
    // A pretty-printed object spans several lines; keep reading until it parses.
    while serde_json::from_str::<Value>(&body).is_err() && body.len() < ERROR_BODY_CAP {
        match reader.next_line().await {
            Ok(Some(line)) => {
                body.push('\n');
                body.push_str(&line);
            }
            Ok(None) | Err(_) => break,
        }
    }
    let message = extract_error_message(&body).unwrap_or_else(|| body.trim().to_string());
    logging::warn(format!("Provider returned a JSON error instead of a stream: {message}"));
    StreamError::ApiError(message)
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    error_message(&value).map(str::to_string)
}
