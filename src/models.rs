//! Conversation and completion models for OpenAI-compatible chat endpoints.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;

// === Core Message Types ===

/// Speaker of a plain text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of a conversation.
///
/// An assistant turn that requests tools never carries text; the text of that
/// turn (if any was streamed) is dropped in favour of the tool calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    Text { role: Role, content: String },
    ToolUse { tool_calls: Vec<ToolCall> },
    ToolResult { tool_call_id: String, content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::Text {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::Text {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Text {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn tool_use(tool_calls: Vec<ToolCall>) -> Self {
        Self::ToolUse { tool_calls }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Wire role of this message.
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            ChatMessage::Text { role, .. } => role.as_str(),
            ChatMessage::ToolUse { .. } => "assistant",
            ChatMessage::ToolResult { .. } => "tool",
        }
    }
}

impl Serialize for ChatMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChatMessage::Text { role, content } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("role", role.as_str())?;
                map.serialize_entry("content", content)?;
                map.end()
            }
            ChatMessage::ToolUse { tool_calls } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("role", "assistant")?;
                map.serialize_entry("content", &None::<&str>)?;
                map.serialize_entry("tool_calls", tool_calls)?;
                map.end()
            }
            ChatMessage::ToolResult {
                tool_call_id,
                content,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("role", "tool")?;
                map.serialize_entry("tool_call_id", tool_call_id)?;
                map.serialize_entry("content", content)?;
                map.end()
            }
        }
    }
}

/// A structured request from the model to invoke a named function.
///
/// `function.arguments` is the raw JSON text exactly as the provider streamed
/// it; it is never parsed here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

impl Serialize for ToolCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut call = serializer.serialize_struct("ToolCall", 3)?;
        call.serialize_field("id", &self.id)?;
        call.serialize_field("type", "function")?;
        call.serialize_field("function", &self.function)?;
        call.end()
    }
}

/// Function name plus raw argument text of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Tool definition advertised to the model.
///
/// `parameters` holds an already-valid JSON schema that is written into the
/// request body verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Box<RawValue>,
}

impl ToolDef {
    /// Build a tool definition, checking that `parameters` is valid JSON.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: impl Into<String>,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            name: name.into(),
            description: description.into(),
            parameters: RawValue::from_string(parameters.into())?,
        })
    }
}

impl Serialize for ToolDef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Function<'a> {
            name: &'a str,
            description: &'a str,
            parameters: &'a RawValue,
        }

        let mut tool = serializer.serialize_struct("Tool", 2)?;
        tool.serialize_field("type", "function")?;
        tool.serialize_field(
            "function",
            &Function {
                name: &self.name,
                description: &self.description,
                parameters: &self.parameters,
            },
        )?;
        tool.end()
    }
}

// === Completion Results ===

/// Token usage reported by the provider, usually on the terminal chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Parse a provider `usage` object.
    ///
    /// Accepts the chat-completions field names and falls back to the
    /// `input_tokens`/`output_tokens` spelling. Returns `None` for non-objects.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let usage = value.as_object()?;
        let field = |primary: &str, fallback: &str| {
            usage
                .get(primary)
                .or_else(|| usage.get(fallback))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0)
        };
        let prompt_tokens = field("prompt_tokens", "input_tokens");
        let completion_tokens = field("completion_tokens", "output_tokens");
        let total_tokens = usage
            .get("total_tokens")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(prompt_tokens + completion_tokens);
        Some(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    }
}

/// What the model produced: narration text or tool invocations, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CompletionResponse {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

/// Final result of one streaming completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionResult {
    pub response: CompletionResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Accumulated reasoning trace, when the provider streamed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// The caller stopped the stream before it finished.
    pub cancelled: bool,
}

impl CompletionResult {
    /// Text of the response, if the model answered with narration.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.response {
            CompletionResponse::Text(text) => Some(text),
            CompletionResponse::ToolCalls(_) => None,
        }
    }

    /// Tool calls of the response, if the model requested any.
    #[must_use]
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match &self.response {
            CompletionResponse::Text(_) => None,
            CompletionResponse::ToolCalls(calls) => Some(calls),
        }
    }

    /// Conversation entry recording this assistant turn.
    #[must_use]
    pub fn to_message(&self) -> ChatMessage {
        match &self.response {
            CompletionResponse::Text(text) => ChatMessage::assistant(text.clone()),
            CompletionResponse::ToolCalls(calls) => ChatMessage::tool_use(calls.clone()),
        }
    }
}
