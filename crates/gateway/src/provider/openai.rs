//! Adapter for OpenAI-compatible upstreams.

use std::collections::BTreeMap;

use anyhow::bail;
use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT},
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

#[derive(Debug)]
pub(crate) struct OpenAiProvider {
    name: String,
    headers: HeaderMap,
    client: Client,
    models: Vec<ModelDescriptor>,
    chat_url: String,
    completion_url: String,
}

impl OpenAiProvider {
    pub(crate) fn new(name: &str, config: &ProviderConfig, client: Client) -> anyhow::Result<Self> {
        let base_url = config.base_url.trim_end_matches('/');

        if base_url.is_empty() {
            bail!("base url must not be empty");
        }

        let mut models = Vec::with_capacity(config.models.len());

        for model in &config.models {
            if model.api_style != ApiStyle::Openai {
                bail!(
                    "openai provider {name:?} received model {:?} with unsupported api_style {:?}",
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
            chat_url: format!("{base_url}/chat/completions"),
            completion_url: format!("{base_url}/completions"),
        })
    }

    fn request(&self, url: &str) -> RequestBuilder {
        self.client.post(url).headers(self.headers.clone())
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, url: &str, payload: &impl Serialize) -> Result<T> {
        let response = self
            .request(url)
            .json(payload)
            .send()
            .await
            .map_err(|error| GatewayError::Connection(format!("{} request failed: {error}", self.name)))?;

        if response.status().as_u16() >= 400 {
            return Err(provider::upstream_error(&self.name, response).await);
        }

        response.json().await.map_err(|error| {
            log::error!("failed to decode {} response: {error}", self.name);
            GatewayError::UpstreamEmpty(format!("{} returned an unparseable response", self.name))
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> Vec<ModelDescriptor> {
        self.models.clone()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        if request.stream {
            return Err(GatewayError::UnsupportedOperation(format!(
                "streaming is not supported for provider {}",
                self.name
            )));
        }

        let payload = ChatPayload::build(&request)?;
        let response: ChatResponseBody = self.send(&self.chat_url, &payload).await?;

        response.into_unified(&self.name)
    }

    async fn completion(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if request.stream {
            return Err(GatewayError::UnsupportedOperation(format!(
                "streaming is not supported for provider {}",
                self.name
            )));
        }

        let payload = CompletionPayload::build(&request)?;
        let response: CompletionResponseBody = self.send(&self.completion_url, &payload).await?;

        response.into_unified(&self.name)
    }
}

/// Default headers first, then provider-scoped extras, inserted so that an
/// operator-supplied header replaces the default of the same name.
fn request_headers(config: &ProviderConfig) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(provider::USER_AGENT));

    let mut authorization = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
        .map_err(|_| anyhow::anyhow!("api_key contains characters not valid in a header value"))?;
    authorization.set_sensitive(true);
    headers.insert(AUTHORIZATION, authorization);

    provider::overlay_extra_headers(&mut headers, &config.headers)?;

    Ok(headers)
}

#[derive(Debug, Serialize)]
struct ChatPayload {
    model: String,
    messages: Vec<PayloadMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PayloadMessage {
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl ChatPayload {
    fn build(request: &ChatRequest) -> Result<Self> {
        let mut messages = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            if message.content.trim().is_empty() {
                return Err(GatewayError::InvalidRequest(
                    "message content must not be empty".to_string(),
                ));
            }

            messages.push(PayloadMessage {
                role: message.role,
                content: message.content.clone(),
                name: message.name.clone(),
            });
        }

        let options = &request.options;

        Ok(Self {
            model: request.model.clone(),
            messages,
            stream: request.stream,
            max_tokens: options.integer("max_tokens"),
            temperature: options.float("temperature"),
            top_p: options.float("top_p"),
            frequency_penalty: options.float("frequency_penalty"),
            presence_penalty: options.float("presence_penalty"),
            stop: options.string_list("stop").map(<[String]>::to_vec),
            response_format: options.map("response_format").cloned(),
            tools: options.raw("tools").cloned(),
            tool_choice: options.raw("tool_choice").cloned(),
            logit_bias: options.float_map("logit_bias"),
            metadata: options.map("metadata").cloned(),
            user: options.string("user").map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    choices: Vec<ChatChoiceBody>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceBody {
    message: PayloadMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone, Copy)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<Option<UsageBody>> for Usage {
    fn from(usage: Option<UsageBody>) -> Self {
        let usage = usage.unwrap_or_default();

        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

impl ChatResponseBody {
    fn into_unified(mut self, provider: &str) -> Result<ChatResponse> {
        if self.choices.is_empty() {
            return Err(GatewayError::UpstreamEmpty(format!(
                "{provider} response did not include choices"
            )));
        }

        let choice = self.choices.swap_remove(0);

        Ok(ChatResponse {
            id: self.id,
            message: Message {
                role: choice.message.role,
                content: choice.message.content,
                name: choice.message.name,
            },
            finish_reason: choice.finish_reason,
            usage: self.usage.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionPayload {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

impl CompletionPayload {
    fn build(request: &CompletionRequest) -> Result<Self> {
        if request.prompt.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("prompt must not be empty".to_string()));
        }

        let options = &request.options;

        Ok(Self {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            stream: request.stream,
            max_tokens: request.max_tokens,
            // An explicit zero is forwarded; only an absent temperature is
            // omitted from the payload.
            temperature: request.temperature,
            top_p: options.float("top_p"),
            stop: options.string_list("stop").map(<[String]>::to_vec),
            logit_bias: options.float_map("logit_bias"),
            user: options.string("user").map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponseBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    choices: Vec<CompletionChoiceBody>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoiceBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl CompletionResponseBody {
    fn into_unified(mut self, provider: &str) -> Result<CompletionResponse> {
        if self.choices.is_empty() {
            return Err(GatewayError::UpstreamEmpty(format!(
                "{provider} completion response did not include choices"
            )));
        }

        let choice = self.choices.swap_remove(0);

        Ok(CompletionResponse {
            id: self.id,
            text: choice.text,
            finish_reason: choice.finish_reason,
            usage: self.usage.into(),
        })
    }
}
