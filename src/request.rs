//! Request body builder for the `/chat/completions` endpoint.

use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

use crate::models::{ChatMessage, ToolDef};

/// Sampling and transport parameters for one completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(serialize_with = "one_decimal")]
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDef]>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

/// Temperature is always written with exactly one decimal digit.
fn one_decimal<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::Error;

    if !value.is_finite() {
        return Err(S::Error::custom(format!("temperature is not finite: {value}")));
    }
    let raw = RawValue::from_string(format!("{value:.1}")).map_err(S::Error::custom)?;
    raw.serialize(serializer)
}

/// Serialize a conversation into a chat-completions request body.
///
/// Usage reporting is requested alongside streaming so the terminal chunk
/// carries token counts. An empty tool list is omitted.
pub fn build_request_body(
    model: &str,
    messages: &[ChatMessage],
    params: RequestParams,
    tools: Option<&[ToolDef]>,
) -> serde_json::Result<Vec<u8>> {
    let request = ChatRequest {
        model,
        messages,
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        stream: params.stream,
        stream_options: params.stream.then_some(StreamOptions {
            include_usage: true,
        }),
        tools: tools.filter(|tools| !tools.is_empty()),
    };
    serde_json::to_vec(&request)
}
