//! OpenAI chat and legacy completion wire formats.
//!
//! Requests deserialize leniently (heterogeneous content shapes become
//! untagged enums) and convert fallibly into the canonical schema; all
//! validation errors carry the offending field in their message.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::{
    error::{GatewayError, Result},
    messages::number_as_u32,
    unified::{
        ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, Message, OptionValue, RequestOptions,
        Role, Usage,
    },
};

/// The OpenAI `/v1/chat/completions` request payload.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub max_tokens: Option<Number>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    #[serde(default)]
    pub stop: Option<StopValue>,
    #[serde(default)]
    pub response_format: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub tool_choice: Option<Value>,
    #[serde(default)]
    pub logit_bias: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub user: Option<String>,
}

/// A message within the chat request.
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Message content arrives as a plain string or as an ordered list of
/// typed segments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Segments(Vec<ContentSegment>),
}

/// One entry of a segmented content list. Only `text` segments are
/// supported; the type is kept as a string so unsupported kinds surface a
/// precise error instead of a decode failure.
#[derive(Debug, Deserialize)]
pub struct ContentSegment {
    pub r#type: String,
    #[serde(default)]
    pub text: String,
}

/// `stop` arrives as a single string or an array of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StopValue {
    One(String),
    Many(Vec<String>),
}

impl StopValue {
    /// Normalize into a list of trimmed, non-empty stop sequences. A single
    /// string and a single-element array produce identical values.
    pub(crate) fn into_sequences(self) -> Result<Vec<String>> {
        let values = match self {
            StopValue::One(value) => vec![value],
            StopValue::Many(values) => values,
        };

        let mut out = Vec::with_capacity(values.len());

        for value in values {
            let value = value.trim();
            if value.is_empty() {
                return Err(GatewayError::InvalidRequest("stop values must not be empty".to_string()));
            }
            out.push(value.to_string());
        }

        Ok(out)
    }
}

impl ChatCompletionRequest {
    /// Validate and convert into the canonical chat request.
    pub fn into_unified(self) -> Result<ChatRequest> {
        let model = required_model(self.model)?;

        if self.messages.is_empty() {
            return Err(GatewayError::InvalidRequest("at least one message is required".to_string()));
        }

        let mut messages = Vec::with_capacity(self.messages.len());

        for (index, message) in self.messages.into_iter().enumerate() {
            messages.push(
                message
                    .into_unified()
                    .map_err(|error| GatewayError::InvalidRequest(format!("messages[{index}]: {error}")))?,
            );
        }

        let mut options = RequestOptions::new();

        if let Some(max_tokens) = self.max_tokens {
            let value = number_as_u32(&max_tokens).ok_or_else(|| {
                GatewayError::InvalidRequest("max_tokens must be a non-negative integer".to_string())
            })?;
            options.insert("max_tokens", OptionValue::Integer(i64::from(value)));
        }

        if let Some(temperature) = self.temperature {
            options.insert("temperature", OptionValue::Float(temperature));
        }

        if let Some(top_p) = self.top_p {
            options.insert("top_p", OptionValue::Float(top_p));
        }

        if let Some(frequency_penalty) = self.frequency_penalty {
            options.insert("frequency_penalty", OptionValue::Float(frequency_penalty));
        }

        if let Some(presence_penalty) = self.presence_penalty {
            options.insert("presence_penalty", OptionValue::Float(presence_penalty));
        }

        if let Some(stop) = self.stop {
            let sequences = stop.into_sequences()?;
            if !sequences.is_empty() {
                options.insert("stop", OptionValue::StringList(sequences));
            }
        }

        if let Some(response_format) = self.response_format {
            options.insert("response_format", OptionValue::Map(response_format));
        }

        if let Some(tools) = self.tools {
            options.insert("tools", OptionValue::Raw(tools));
        }

        if let Some(tool_choice) = self.tool_choice {
            options.insert("tool_choice", OptionValue::Raw(tool_choice));
        }

        if let Some(logit_bias) = self.logit_bias {
            options.insert("logit_bias", OptionValue::Map(logit_bias));
        }

        if let Some(metadata) = self.metadata {
            options.insert("metadata", OptionValue::Map(metadata));
        }

        if let Some(user) = self.user
            && !user.is_empty()
        {
            options.insert("user", OptionValue::String(user));
        }

        Ok(ChatRequest {
            model,
            messages,
            stream: self.stream,
            options,
        })
    }
}

impl ChatMessage {
    fn into_unified(self) -> std::result::Result<Message, String> {
        let role = match self.role.as_deref().map(str::trim) {
            Some("system") => Role::System,
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            Some("tool") => Role::Tool,
            Some(other) => return Err(format!("invalid role: {other}")),
            None => return Err("missing role".to_string()),
        };

        let content = match self.content {
            None => return Err("missing content".to_string()),
            Some(MessageContent::Text(text)) => text,
            Some(MessageContent::Segments(segments)) => {
                let mut combined = String::new();
                for segment in segments {
                    if segment.r#type != "text" {
                        return Err(format!("segment type {:?} not supported", segment.r#type));
                    }
                    combined.push_str(&segment.text);
                }
                combined
            }
        };

        if content.trim().is_empty() {
            return Err("message content must not be empty".to_string());
        }

        let name = self.name.map(|name| name.trim().to_string()).filter(|name| !name.is_empty());

        Ok(Message { role, content, name })
    }
}

/// The OpenAI-compatible chat completion response envelope.
#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageBody>,
}

/// A single choice in the chat response.
#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token usage block mirroring the OpenAI response format.
#[derive(Debug, Serialize)]
pub struct UsageBody {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl UsageBody {
    fn from_unified(usage: Usage) -> Option<Self> {
        if usage.is_empty() {
            return None;
        }

        Some(Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })
    }
}

impl ChatCompletionResponse {
    /// Serialize a canonical response back into the OpenAI envelope.
    pub fn from_unified(model_id: &str, created_unix: u64, response: &ChatResponse) -> Self {
        Self {
            id: response.id.clone(),
            object: "chat.completion",
            created: created_unix,
            model: model_id.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: response.message.clone(),
                finish_reason: response.finish_reason.clone(),
            }],
            usage: UsageBody::from_unified(response.usage),
        }
    }
}

/// The OpenAI `/v1/completions` (legacy text completion) request payload.
#[derive(Debug, Deserialize)]
pub struct LegacyCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<PromptValue>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub max_tokens: Option<Number>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
}

/// `prompt` arrives as a single string or an array of strings joined with
/// newline separators.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PromptValue {
    Text(String),
    Parts(Vec<String>),
}

impl LegacyCompletionRequest {
    /// Validate and convert into the canonical completion request.
    pub fn into_unified(self) -> Result<CompletionRequest> {
        let model = required_model(self.model)?;

        let prompt = match self.prompt {
            None => return Err(GatewayError::InvalidRequest("prompt is required".to_string())),
            Some(PromptValue::Text(text)) => text,
            Some(PromptValue::Parts(parts)) => parts.join("\n"),
        };

        if prompt.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("prompt must not be empty".to_string()));
        }

        let max_tokens = match &self.max_tokens {
            Some(number) => Some(number_as_u32(number).ok_or_else(|| {
                GatewayError::InvalidRequest("max_tokens must be a non-negative integer".to_string())
            })?),
            None => None,
        };

        let mut options = RequestOptions::new();

        if let Some(max_tokens) = max_tokens {
            options.insert("max_tokens", OptionValue::Integer(i64::from(max_tokens)));
        }

        if let Some(temperature) = self.temperature {
            options.insert("temperature", OptionValue::Float(temperature));
        }

        if let Some(top_p) = self.top_p {
            options.insert("top_p", OptionValue::Float(top_p));
        }

        Ok(CompletionRequest {
            model,
            prompt,
            stream: self.stream,
            max_tokens,
            temperature: self.temperature,
            options,
        })
    }
}

/// The OpenAI-compatible legacy completion response envelope.
#[derive(Debug, Serialize)]
pub struct LegacyCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageBody>,
}

/// A single choice in the legacy completion response.
#[derive(Debug, Serialize)]
pub struct CompletionChoice {
    pub text: String,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl LegacyCompletionResponse {
    /// Serialize a canonical response back into the OpenAI envelope.
    pub fn from_unified(model_id: &str, created_unix: u64, response: &CompletionResponse) -> Self {
        Self {
            id: response.id.clone(),
            object: "text_completion",
            created: created_unix,
            model: model_id.to_string(),
            choices: vec![CompletionChoice {
                text: response.text.clone(),
                index: 0,
                finish_reason: response.finish_reason.clone(),
            }],
            usage: UsageBody::from_unified(response.usage),
        }
    }
}

fn required_model(model: Option<String>) -> Result<String> {
    let model = model.map(|model| model.trim().to_string()).unwrap_or_default();

    if model.is_empty() {
        return Err(GatewayError::InvalidRequest("model must be provided".to_string()));
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;
    use serde_json::json;

    use super::*;

    fn parse_chat(value: serde_json::Value) -> Result<ChatRequest> {
        serde_json::from_value::<ChatCompletionRequest>(value).unwrap().into_unified()
    }

    fn parse_completion(value: serde_json::Value) -> Result<CompletionRequest> {
        serde_json::from_value::<LegacyCompletionRequest>(value).unwrap().into_unified()
    }

    #[test]
    fn parses_string_content() {
        let request = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hello"}],
        }))
        .unwrap();

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "hello");
        assert!(!request.stream);
    }

    #[test]
    fn concatenates_text_segments_in_order() {
        let request = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "first "},
                    {"type": "text", "text": "second"},
                ],
            }],
        }))
        .unwrap();

        assert_eq!(request.messages[0].content, "first second");
    }

    #[test]
    fn rejects_non_text_segments() {
        let error = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{
                "role": "user",
                "content": [{"type": "image_url", "image_url": {"url": "https://example.com/x.png"}}],
            }],
        }))
        .unwrap_err();

        assert_eq!(
            error.to_string(),
            r#"messages[0]: segment type "image_url" not supported"#
        );
    }

    #[test]
    fn rejects_empty_model_and_messages() {
        let error = parse_chat(json!({"messages": [{"role": "user", "content": "hi"}]})).unwrap_err();
        assert_eq!(error.to_string(), "model must be provided");

        let error = parse_chat(json!({"model": "  ", "messages": [{"role": "user", "content": "hi"}]})).unwrap_err();
        assert_eq!(error.to_string(), "model must be provided");

        let error = parse_chat(json!({"model": "gpt-4o", "messages": []})).unwrap_err();
        assert_eq!(error.to_string(), "at least one message is required");
    }

    #[test]
    fn rejects_invalid_role_and_empty_content() {
        let error = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "narrator", "content": "hi"}],
        }))
        .unwrap_err();
        assert_eq!(error.to_string(), "messages[0]: invalid role: narrator");

        let error = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "   "}],
        }))
        .unwrap_err();
        assert_eq!(error.to_string(), "messages[0]: message content must not be empty");
    }

    #[test]
    fn stop_string_and_single_element_array_are_identical() {
        let from_string = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "stop": "###",
        }))
        .unwrap();

        let from_array = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "stop": ["###"],
        }))
        .unwrap();

        assert_eq!(
            from_string.options.string_list("stop"),
            from_array.options.string_list("stop"),
        );
        assert_eq!(from_string.options.string_list("stop"), Some(&["###".to_string()][..]));
    }

    #[test]
    fn rejects_empty_stop_entries() {
        let error = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "stop": ["###", "  "],
        }))
        .unwrap_err();

        assert_eq!(error.to_string(), "stop values must not be empty");
    }

    #[test]
    fn lifts_recognized_options() {
        let request = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 128,
            "temperature": 0.5,
            "top_p": 0.9,
            "frequency_penalty": 0.1,
            "presence_penalty": -0.2,
            "response_format": {"type": "json_object"},
            "tools": [{"type": "function", "function": {"name": "f"}}],
            "tool_choice": "auto",
            "logit_bias": {"50256": -100},
            "metadata": {"trace": "abc"},
            "user": "user-123",
        }))
        .unwrap();

        assert_eq!(request.options.integer("max_tokens"), Some(128));
        assert_eq!(request.options.float("temperature"), Some(0.5));
        assert_eq!(request.options.float("top_p"), Some(0.9));
        assert_eq!(request.options.float("frequency_penalty"), Some(0.1));
        assert_eq!(request.options.float("presence_penalty"), Some(-0.2));
        assert!(request.options.map("response_format").is_some());
        assert!(request.options.raw("tools").is_some());
        assert!(request.options.raw("tool_choice").is_some());
        assert!(request.options.map("logit_bias").is_some());
        assert!(request.options.map("metadata").is_some());
        assert_eq!(request.options.string("user"), Some("user-123"));
    }

    #[test]
    fn accepts_float_encoded_max_tokens() {
        let request = parse_chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 128.0,
        }))
        .unwrap();

        assert_eq!(request.options.integer("max_tokens"), Some(128));
    }

    #[test]
    fn chat_round_trip_preserves_model_messages_and_options() {
        let payload = json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi", "name": "alice"},
            ],
            "temperature": 0.5,
            "stop": ["###"],
        });

        let request = parse_chat(payload).unwrap();

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "be terse");
        assert_eq!(request.messages[1].name.as_deref(), Some("alice"));
        assert_eq!(request.options.float("temperature"), Some(0.5));
        assert_eq!(request.options.string_list("stop"), Some(&["###".to_string()][..]));
    }

    #[test]
    fn completion_prompt_array_joins_with_newlines() {
        let request = parse_completion(json!({
            "model": "gpt-3.5-turbo-instruct",
            "prompt": ["first", "second"],
        }))
        .unwrap();

        assert_eq!(request.prompt, "first\nsecond");
    }

    #[test]
    fn completion_rejects_empty_prompt() {
        let error = parse_completion(json!({"model": "m", "prompt": "  "})).unwrap_err();
        assert_eq!(error.to_string(), "prompt must not be empty");

        let error = parse_completion(json!({"model": "m"})).unwrap_err();
        assert_eq!(error.to_string(), "prompt is required");
    }

    #[test]
    fn completion_preserves_explicit_zero_temperature() {
        let request = parse_completion(json!({
            "model": "m",
            "prompt": "p",
            "temperature": 0,
        }))
        .unwrap();

        assert_eq!(request.temperature, Some(0.0));
    }

    #[test]
    fn chat_response_envelope_shape() {
        let response = ChatResponse {
            id: "chatcmpl-1".to_string(),
            message: Message {
                role: Role::Assistant,
                content: "hello there".to_string(),
                name: None,
            },
            finish_reason: Some("stop".to_string()),
            usage: Usage {
                prompt_tokens: 3,
                completion_tokens: 5,
                total_tokens: 8,
            },
        };

        let body = ChatCompletionResponse::from_unified("gpt-4o", 1700000000, &response);

        assert_json_snapshot!(body, @r#"
        {
          "id": "chatcmpl-1",
          "object": "chat.completion",
          "created": 1700000000,
          "model": "gpt-4o",
          "choices": [
            {
              "index": 0,
              "message": {
                "role": "assistant",
                "content": "hello there"
              },
              "finish_reason": "stop"
            }
          ],
          "usage": {
            "prompt_tokens": 3,
            "completion_tokens": 5,
            "total_tokens": 8
          }
        }
        "#);
    }

    #[test]
    fn all_zero_usage_is_omitted() {
        let response = CompletionResponse {
            id: "cmpl-1".to_string(),
            text: "done".to_string(),
            finish_reason: None,
            usage: Usage::default(),
        };

        let body = LegacyCompletionResponse::from_unified("m", 0, &response);

        assert_json_snapshot!(body, @r#"
        {
          "id": "cmpl-1",
          "object": "text_completion",
          "created": 0,
          "model": "m",
          "choices": [
            {
              "text": "done",
              "index": 0
            }
          ]
        }
        "#);
    }
}
