//! Adapter for the Anthropic Claude messages API.

use anyhow::bail;
use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use config::{ApiStyle, ProviderConfig};

use crate::{
    error::{GatewayError, Result},
    provider::{self, Provider},
    unified::{
        ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, Message, ModelDescriptor, Role, Usage,
    },
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug)]
pub(crate) struct ClaudeProvider {
    name: String,
    headers: HeaderMap,
    client: Client,
    models: Vec<ModelDescriptor>,
    messages_url: String,
}

impl ClaudeProvider {
    pub(crate) fn new(name: &str, config: &ProviderConfig, client: Client) -> anyhow::Result<Self> {
        let base_url = config.base_url.trim_end_matches('/');

        if base_url.is_empty() {
            bail!("base url must not be empty");
        }

        let mut models = Vec::with_capacity(config.models.len());

        for model in &config.models {
            if model.api_style != ApiStyle::Claude {
                bail!(
                    "claude provider {name:?} received model {:?} with unsupported api_style {:?}",
                    model.id,
                    model.api_style.to_string(),
                );
            }

            models.push(ModelDescriptor {
                id: model.id.clone(),
                provider: name.to_string(),
                api_style: model.api_style,
            });
        }

        Ok(Self {
            name: name.to_string(),
            headers: request_headers(config)?,
            client,
            models,
            messages_url: format!("{base_url}/v1/messages"),
        })
    }

    fn request(&self) -> RequestBuilder {
        self.client.post(&self.messages_url).headers(self.headers.clone())
    }
}

/// Default headers first, then provider-scoped extras, inserted so that an
/// operator-supplied header replaces the default of the same name.
fn request_headers(config: &ProviderConfig) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(provider::USER_AGENT));
    headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

    let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
        .map_err(|_| anyhow::anyhow!("api_key contains characters not valid in a header value"))?;
    api_key.set_sensitive(true);
    headers.insert("x-api-key", api_key);

    provider::overlay_extra_headers(&mut headers, &config.headers)?;

    Ok(headers)
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> Vec<ModelDescriptor> {
        self.models.clone()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = MessagePayload::build(&request)?;

        let response = self
            .request()
            .json(&payload)
            .send()
            .await
            .map_err(|error| GatewayError::Connection(format!("{} request failed: {error}", self.name)))?;

        if response.status().as_u16() >= 400 {
            return Err(provider::upstream_error(&self.name, response).await);
        }

        let body: MessageResponseBody = response.json().await.map_err(|error| {
            log::error!("failed to decode {} response: {error}", self.name);
            GatewayError::UpstreamEmpty(format!("{} returned an unparseable response", self.name))
        })?;

        body.into_unified(&self.name)
    }

    async fn completion(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        Err(GatewayError::UnsupportedOperation(format!(
            "completions are not supported by provider {}",
            self.name
        )))
    }
}

#[derive(Debug, Serialize)]
struct MessagePayload {
    model: String,
    messages: Vec<MessageBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Map<String, Value>>,
    /// The upstream call is never streamed; client streaming is synthesized
    /// at the HTTP surface.
    stream: bool,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    role: Role,
    content: Vec<ContentBlockBody>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBlockBody {
    r#type: String,
    #[serde(default)]
    text: String,
}

impl MessagePayload {
    fn build(request: &ChatRequest) -> Result<Self> {
        let mut messages = Vec::with_capacity(request.messages.len());
        let mut system_parts = Vec::new();

        for message in &request.messages {
            match message.role {
                Role::System => {
                    let text = message.content.trim();
                    if !text.is_empty() {
                        system_parts.push(text.to_string());
                    }
                }
                Role::User | Role::Assistant => {
                    let text = message.content.trim();
                    if text.is_empty() {
                        return Err(GatewayError::InvalidRequest(
                            "claude messages must not be empty".to_string(),
                        ));
                    }

                    messages.push(MessageBody {
                        role: message.role,
                        content: vec![ContentBlockBody {
                            r#type: "text".to_string(),
                            text: text.to_string(),
                        }],
                    });
                }
                Role::Tool => {
                    return Err(GatewayError::InvalidRequest(
                        "claude provider does not support role \"tool\"".to_string(),
                    ));
                }
            }
        }

        if messages.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "claude request requires at least one user message".to_string(),
            ));
        }

        if messages[0].role != Role::User {
            return Err(GatewayError::InvalidRequest(
                "claude conversation must start with a user message".to_string(),
            ));
        }

        let max_tokens = request.options.integer("max_tokens").filter(|value| *value > 0).ok_or_else(|| {
            GatewayError::InvalidRequest("claude requests require a positive max_tokens value".to_string())
        })?;

        Ok(Self {
            model: request.model.clone(),
            messages,
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            max_tokens,
            temperature: request.options.float("temperature"),
            top_p: request.options.float("top_p"),
            stop_sequences: request.options.string_list("stop").map(<[String]>::to_vec),
            metadata: request.options.map("metadata").cloned(),
            stream: false,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponseBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    content: Vec<ContentBlockBody>,
    #[serde(default)]
    usage: ClaudeUsageBody,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClaudeUsageBody {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl MessageResponseBody {
    fn into_unified(self, provider: &str) -> Result<ChatResponse> {
        if self.content.is_empty() {
            return Err(GatewayError::UpstreamEmpty(format!(
                "{provider} response missing content blocks"
            )));
        }

        let mut text = String::new();

        for block in &self.content {
            if block.r#type != "text" {
                return Err(GatewayError::Provider {
                    provider: provider.to_string(),
                    error_type: "unsupported_content".to_string(),
                    message: format!("unsupported content block type {:?}", block.r#type),
                });
            }
            text.push_str(&block.text);
        }

        // Claude reports input and output separately; the total is derived.
        let usage = Usage {
            prompt_tokens: self.usage.input_tokens,
            completion_tokens: self.usage.output_tokens,
            total_tokens: self.usage.input_tokens + self.usage.output_tokens,
        };

        Ok(ChatResponse {
            id: self.id,
            message: Message {
                role: self.role.unwrap_or(Role::Assistant),
                content: text,
                name: None,
            },
            finish_reason: self.stop_reason,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;
    use serde_json::json;

    use super::*;
    use crate::unified::{OptionValue, RequestOptions};

    fn request_with(messages: Vec<Message>, options: RequestOptions) -> ChatRequest {
        ChatRequest {
            model: "claude-3-sonnet".to_string(),
            messages,
            stream: false,
            options,
        }
    }

    fn max_tokens(value: i64) -> RequestOptions {
        let mut options = RequestOptions::new();
        options.insert("max_tokens", OptionValue::Integer(value));
        options
    }

    fn user_message(content: &str) -> Message {
        Message {
            role: Role::User,
            content: content.to_string(),
            name: None,
        }
    }

    fn system_message(content: &str) -> Message {
        Message {
            role: Role::System,
            content: content.to_string(),
            name: None,
        }
    }

    #[test]
    fn system_messages_join_on_double_newline() {
        let request = request_with(
            vec![system_message("A"), system_message("B"), user_message("q")],
            max_tokens(10),
        );

        let payload = MessagePayload::build(&request).unwrap();

        assert_eq!(payload.system.as_deref(), Some("A\n\nB"));
    }

    #[test]
    fn payload_shape() {
        let mut options = max_tokens(256);
        options.insert("temperature", OptionValue::Float(0.3));
        options.insert("stop", OptionValue::StringList(vec!["END".to_string()]));

        let request = request_with(vec![system_message("be brief"), user_message("q")], options);
        let payload = MessagePayload::build(&request).unwrap();

        assert_json_snapshot!(payload, @r#"
        {
          "model": "claude-3-sonnet",
          "messages": [
            {
              "role": "user",
              "content": [
                {
                  "type": "text",
                  "text": "q"
                }
              ]
            }
          ],
          "system": "be brief",
          "max_tokens": 256,
          "temperature": 0.3,
          "stop_sequences": [
            "END"
          ],
          "stream": false
        }
        "#);
    }

    #[test]
    fn requires_positive_max_tokens() {
        let request = request_with(vec![user_message("q")], RequestOptions::new());
        let error = MessagePayload::build(&request).unwrap_err();
        assert_eq!(error.to_string(), "claude requests require a positive max_tokens value");

        let request = request_with(vec![user_message("q")], max_tokens(0));
        let error = MessagePayload::build(&request).unwrap_err();
        assert_eq!(error.to_string(), "claude requests require a positive max_tokens value");
    }

    #[test]
    fn rejects_conversations_not_starting_with_user() {
        let request = request_with(
            vec![Message {
                role: Role::Assistant,
                content: "x".to_string(),
                name: None,
            }],
            max_tokens(10),
        );

        let error = MessagePayload::build(&request).unwrap_err();
        assert_eq!(error.to_string(), "claude conversation must start with a user message");
    }

    #[test]
    fn rejects_system_only_conversations() {
        let request = request_with(vec![system_message("just context")], max_tokens(10));

        let error = MessagePayload::build(&request).unwrap_err();
        assert_eq!(error.to_string(), "claude request requires at least one user message");
    }

    #[test]
    fn rejects_tool_role() {
        let request = request_with(
            vec![
                user_message("q"),
                Message {
                    role: Role::Tool,
                    content: "result".to_string(),
                    name: None,
                },
            ],
            max_tokens(10),
        );

        let error = MessagePayload::build(&request).unwrap_err();
        assert_eq!(error.to_string(), "claude provider does not support role \"tool\"");
    }

    #[test]
    fn upstream_stream_flag_is_always_false() {
        let mut request = request_with(vec![user_message("q")], max_tokens(10));
        request.stream = true;

        let payload = MessagePayload::build(&request).unwrap();

        assert!(!payload.stream);
    }

    #[test]
    fn response_concatenates_text_blocks_and_derives_total() {
        let body: MessageResponseBody = serde_json::from_value(json!({
            "id": "msg_01",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": ", world"},
            ],
            "usage": {"input_tokens": 7, "output_tokens": 3},
            "stop_reason": "end_turn",
        }))
        .unwrap();

        let response = body.into_unified("claude").unwrap();

        assert_eq!(response.message.content, "Hello, world");
        assert_eq!(response.usage.prompt_tokens, 7);
        assert_eq!(response.usage.completion_tokens, 3);
        assert_eq!(response.usage.total_tokens, 10);
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn response_role_defaults_to_assistant() {
        let body: MessageResponseBody = serde_json::from_value(json!({
            "id": "msg_01",
            "content": [{"type": "text", "text": "hi"}],
            "usage": {"input_tokens": 1, "output_tokens": 1},
        }))
        .unwrap();

        let response = body.into_unified("claude").unwrap();

        assert_eq!(response.message.role, Role::Assistant);
    }

    #[test]
    fn non_text_response_blocks_are_provider_errors() {
        let body: MessageResponseBody = serde_json::from_value(json!({
            "id": "msg_01",
            "content": [{"type": "tool_use", "id": "toolu_1"}],
            "usage": {"input_tokens": 1, "output_tokens": 1},
        }))
        .unwrap();

        let error = body.into_unified("claude").unwrap_err();

        assert!(matches!(error, GatewayError::Provider { .. }));
    }

    #[test]
    fn completion_is_always_unsupported() {
        let config: ProviderConfig = serde_yaml::from_str(indoc::indoc! {r#"
            api_key: sk-ant-test
            base_url: https://api.anthropic.com
            models:
              - id: claude-3-sonnet
                api_style: claude
        "#})
        .unwrap();

        let provider = ClaudeProvider::new("claude", &config, Client::new()).unwrap();

        let request = CompletionRequest {
            model: "claude-3-sonnet".to_string(),
            prompt: "p".to_string(),
            stream: false,
            max_tokens: Some(5),
            temperature: None,
            options: RequestOptions::new(),
        };

        let error = futures::executor::block_on(provider.completion(request)).unwrap_err();

        assert!(matches!(error, GatewayError::UnsupportedOperation(_)));
    }
}
