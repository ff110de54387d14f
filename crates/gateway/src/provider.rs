//! Upstream provider adapters.
//!
//! Each adapter knows one upstream wire dialect: it translates canonical
//! requests into that dialect, performs the HTTP round-trip, and translates
//! the upstream response back.

pub(crate) mod claude;
mod http_client;
pub(crate) mod nvidia;
pub(crate) mod openai;

use async_trait::async_trait;
use serde::Deserialize;

pub(crate) use http_client::upstream_client;

use crate::{
    error::{GatewayError, Result},
    unified::{ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, ModelDescriptor},
};

pub(crate) const USER_AGENT: &str = "modelgate/0.1";

/// Insert provider-scoped extra headers over the defaults. Config validation
/// restricts header names to letters and `-`, so parse failures here mean
/// the value side is malformed.
pub(crate) fn overlay_extra_headers(
    headers: &mut reqwest::header::HeaderMap,
    extra: &std::collections::BTreeMap<String, String>,
) -> anyhow::Result<()> {
    use reqwest::header::{HeaderName, HeaderValue};

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| anyhow::anyhow!("header name {name:?} is not valid"))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| anyhow::anyhow!("header {name:?} has an invalid value"))?;

        headers.insert(name, value);
    }

    Ok(())
}

/// Behaviour required of every upstream adapter.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Stable provider name used for registration and logging.
    fn name(&self) -> &str;

    /// The model descriptors this adapter serves.
    fn models(&self) -> Vec<ModelDescriptor>;

    /// Execute a chat completion against the upstream.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Execute a legacy text completion against the upstream.
    async fn completion(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Upstream error bodies are read through a bounded buffer.
const ERROR_BODY_LIMIT: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    r#type: String,
}

/// Map a non-2xx upstream response into a gateway error, reading at most
/// 64 KiB of the body. A parseable `{"error": {...}}` envelope surfaces its
/// type and message; anything else surfaces the literal status and body.
pub(crate) async fn upstream_error(provider: &str, response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = read_limited_body(response).await;

    if let Ok(envelope) = serde_json::from_slice::<ApiErrorEnvelope>(&body)
        && !envelope.error.message.is_empty()
    {
        log::error!("{provider} API error ({status}): {}", envelope.error.message);

        return GatewayError::Provider {
            provider: provider.to_string(),
            error_type: envelope.error.r#type,
            message: envelope.error.message,
        };
    }

    let body = String::from_utf8_lossy(&body).trim().to_string();
    log::error!("{provider} API error ({status}): {body}");

    GatewayError::UpstreamStatus { status, body }
}

async fn read_limited_body(response: reqwest::Response) -> Vec<u8> {
    use futures::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };

        let remaining = ERROR_BODY_LIMIT - buffer.len();
        if chunk.len() >= remaining {
            buffer.extend_from_slice(&chunk[..remaining]);
            break;
        }

        buffer.extend_from_slice(&chunk);
    }

    buffer
}
