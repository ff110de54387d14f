//! HTTP surface of the gateway: routes, body-size enforcement, and the
//! dialect handlers wiring ingress translators to the dispatcher.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use arc_swap::ArcSwap;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};

mod dispatcher;
mod error;
mod messages;
mod provider;
mod registry;
mod sse;
mod unified;

pub use dispatcher::{Dispatcher, build_dispatcher};
pub use error::{ErrorMessage, GatewayError, Result};
pub use provider::Provider;
pub use registry::Registry;
pub use unified::{
    ApiStyle, ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, Message, ModelDescriptor,
    OptionValue, RequestOptions, Role, Usage,
};

use crate::messages::{claude, openai};

/// Ingress request bodies are capped at 1 MiB.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Atomically replaceable handle to the live dispatch plane.
///
/// Handlers load the dispatcher once per request, so an in-flight request
/// keeps its plane even while the hot-reload controller publishes a new one.
pub type SharedDispatcher = Arc<ArcSwap<Dispatcher>>;

/// Creates the axum router for the gateway endpoints.
pub fn router(dispatcher: SharedDispatcher) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/completions", post(completions))
        .route("/v1/messages", post(claude_messages))
        .with_state(dispatcher)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn chat_completions(State(shared): State<SharedDispatcher>, body: Body) -> Result<impl IntoResponse> {
    let request: openai::ChatCompletionRequest = decode_request_body(body).await?;
    let unified = request.into_unified()?;

    log::debug!("chat completions request for model {}", unified.model);

    let dispatcher = shared.load_full();
    let (response, descriptor) = dispatcher.chat(unified).await?;

    Ok(Json(openai::ChatCompletionResponse::from_unified(
        &descriptor.id,
        unix_now(),
        &response,
    )))
}

async fn completions(State(shared): State<SharedDispatcher>, body: Body) -> Result<impl IntoResponse> {
    let request: openai::LegacyCompletionRequest = decode_request_body(body).await?;
    let unified = request.into_unified()?;

    log::debug!("completions request for model {}", unified.model);

    let dispatcher = shared.load_full();
    let (response, descriptor) = dispatcher.completion(unified).await?;

    Ok(Json(openai::LegacyCompletionResponse::from_unified(
        &descriptor.id,
        unix_now(),
        &response,
    )))
}

async fn claude_messages(State(shared): State<SharedDispatcher>, body: Body) -> Result<Response> {
    let request: claude::MessagesRequest = decode_request_body(body).await?;
    let stream_requested = request.stream;

    let mut unified = request.into_unified()?;
    // The upstream call never streams; the streamed transcript is
    // synthesized from the completed response below.
    unified.stream = false;

    log::debug!(
        "claude messages request for model {} (stream: {stream_requested})",
        unified.model
    );

    let dispatcher = shared.load_full();
    let (response, descriptor) = dispatcher.chat(unified).await?;

    if stream_requested {
        return Ok(sse::claude_stream(&descriptor.id, &response).into_response());
    }

    Ok(Json(claude::MessagesResponse::from_unified(&descriptor.id, &response)).into_response())
}

/// Read the request body under the ingress cap and decode it strictly:
/// empty bodies and trailing garbage are both rejected.
async fn decode_request_body<T: serde::de::DeserializeOwned>(body: Body) -> Result<T> {
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| GatewayError::PayloadTooLarge)?;

    if bytes.is_empty() {
        return Err(GatewayError::InvalidRequest("request body is required".to_string()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|error| GatewayError::InvalidRequest(format!("invalid JSON payload: {error}")))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
