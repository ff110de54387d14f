//! Anthropic `/v1/messages` wire format.
//!
//! The `system` field is accepted in four shapes (string, string list,
//! single text block, block list) and every message content in two (string
//! or text-block list); all of them normalize into flat strings before the
//! canonical layer.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::{
    error::{GatewayError, Result},
    messages::number_as_u32,
    unified::{ChatRequest, ChatResponse, Message, OptionValue, RequestOptions, Role},
};

/// The Anthropic messages request payload.
#[derive(Debug, Deserialize)]
pub struct MessagesRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<Number>,
    #[serde(default)]
    pub messages: Vec<MessageParam>,
    #[serde(default)]
    pub system: Option<SystemPrompt>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

/// A message within the request.
#[derive(Debug, Deserialize)]
pub struct MessageParam {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Message content arrives as a plain string or a list of content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlockParam>),
}

/// One block of a segmented content list. The type stays a string so
/// unsupported kinds produce a precise error.
#[derive(Debug, Deserialize)]
pub struct ContentBlockParam {
    pub r#type: String,
    #[serde(default)]
    pub text: String,
}

/// The `system` field in all four accepted shapes. The untagged variants are
/// tried in declaration order, matching the precedence a block can satisfy.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    TextList(Vec<String>),
    Block(SystemBlock),
    BlockList(Vec<SystemBlock>),
}

/// A system prompt block; only `text` blocks are supported.
#[derive(Debug, Deserialize)]
pub struct SystemBlock {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl SystemPrompt {
    /// Normalize into trimmed, non-empty system prompt parts.
    fn into_parts(self) -> Result<Vec<String>> {
        let parts = match self {
            SystemPrompt::Text(text) => vec![text],
            SystemPrompt::TextList(texts) => texts,
            SystemPrompt::Block(block) => vec![block.into_text()?],
            SystemPrompt::BlockList(blocks) => {
                let mut texts = Vec::with_capacity(blocks.len());
                for block in blocks {
                    texts.push(block.into_text()?);
                }
                texts
            }
        };

        Ok(parts
            .into_iter()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect())
    }
}

impl SystemBlock {
    fn into_text(self) -> Result<String> {
        match self.r#type.as_deref() {
            None | Some("text") => Ok(self.text),
            Some(other) => Err(GatewayError::InvalidRequest(format!(
                "system: unsupported block type {other:?}"
            ))),
        }
    }
}

impl MessagesRequest {
    /// Validate and convert into the canonical chat request. System prompt
    /// parts become leading `system`-role messages.
    pub fn into_unified(self) -> Result<ChatRequest> {
        let model = self.model.map(|model| model.trim().to_string()).unwrap_or_default();

        if model.is_empty() {
            return Err(GatewayError::InvalidRequest("model must be provided".to_string()));
        }

        if self.messages.is_empty() {
            return Err(GatewayError::InvalidRequest("at least one message is required".to_string()));
        }

        let system_parts = match self.system {
            Some(system) => system.into_parts()?,
            None => Vec::new(),
        };

        let mut messages = Vec::with_capacity(system_parts.len() + self.messages.len());

        for part in system_parts {
            messages.push(Message {
                role: Role::System,
                content: part,
                name: None,
            });
        }

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

        if let Some(stop_sequences) = self.stop_sequences {
            let mut sequences = Vec::with_capacity(stop_sequences.len());

            for sequence in stop_sequences {
                let sequence = sequence.trim();
                if sequence.is_empty() {
                    return Err(GatewayError::InvalidRequest(
                        "stop_sequences values must not be empty".to_string(),
                    ));
                }
                sequences.push(sequence.to_string());
            }

            if !sequences.is_empty() {
                options.insert("stop", OptionValue::StringList(sequences));
            }
        }

        if let Some(metadata) = self.metadata {
            options.insert("metadata", OptionValue::Map(metadata));
        }

        Ok(ChatRequest {
            model,
            messages,
            stream: self.stream,
            options,
        })
    }
}

impl MessageParam {
    fn into_unified(self) -> std::result::Result<Message, String> {
        let role = match self.role.as_deref().map(str::trim) {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            Some(other) => return Err(format!("invalid role: {other}")),
            None => return Err("missing role".to_string()),
        };

        let content = match self.content {
            None => return Err("missing content".to_string()),
            Some(MessageContent::Text(text)) => text.trim().to_string(),
            Some(MessageContent::Blocks(blocks)) => {
                let mut combined = String::new();
                for block in blocks {
                    if block.r#type != "text" {
                        return Err(format!("unsupported block type {:?}", block.r#type));
                    }
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str(block.text.trim());
                }
                combined.trim().to_string()
            }
        };

        if content.is_empty() {
            return Err("message content must not be empty".to_string());
        }

        let name = self.name.map(|name| name.trim().to_string()).filter(|name| !name.is_empty());

        Ok(Message { role, content, name })
    }
}

/// The Anthropic messages response envelope.
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub id: String,
    pub r#type: &'static str,
    pub role: Role,
    pub model: String,
    pub content: Vec<TextBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    pub usage: UsageBody,
}

/// A text content block in the response.
#[derive(Debug, Serialize)]
pub struct TextBlock {
    pub r#type: &'static str,
    pub text: String,
}

/// Token usage mirroring the Anthropic format, with the derived total.
#[derive(Debug, Serialize)]
pub struct UsageBody {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl MessagesResponse {
    /// Serialize a canonical response back into the Anthropic envelope.
    pub fn from_unified(model_id: &str, response: &ChatResponse) -> Self {
        Self {
            id: response.id.clone(),
            r#type: "message",
            role: response.message.role,
            model: model_id.to_string(),
            content: vec![TextBlock {
                r#type: "text",
                text: response.message.content.clone(),
            }],
            stop_reason: response.finish_reason.clone(),
            stop_sequence: None,
            usage: UsageBody {
                input_tokens: response.usage.prompt_tokens,
                output_tokens: response.usage.completion_tokens,
                total_tokens: response.usage.total_tokens,
            },
        }
    }
}
