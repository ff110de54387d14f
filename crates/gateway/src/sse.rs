//! Synthetic Claude streaming.
//!
//! Upstream calls are always non-streaming; when a client requests a
//! streamed `/v1/messages` response, the completed message is reframed into
//! the fixed Anthropic event sequence:
//!
//! `message_start` → `content_block_start` → `content_block_delta` →
//! `content_block_stop` → `message_delta` → `message_stop`
//!
//! The single `content_block_delta` carries the full response text.

use std::convert::Infallible;

use axum::response::{
    IntoResponse,
    sse::{Event, Sse},
};
use serde_json::{Value, json};

use crate::unified::ChatResponse;

pub(crate) fn claude_stream(model_id: &str, response: &ChatResponse) -> impl IntoResponse {
    let events = synthesis_events(model_id, response)
        .into_iter()
        .map(|(name, payload)| Ok::<_, Infallible>(Event::default().event(name).data(payload.to_string())));

    Sse::new(futures::stream::iter(events))
}

fn synthesis_events(model_id: &str, response: &ChatResponse) -> Vec<(&'static str, Value)> {
    let usage = json!({
        "input_tokens": response.usage.prompt_tokens,
        "output_tokens": response.usage.completion_tokens,
        "total_tokens": response.usage.total_tokens,
    });

    vec![
        (
            "message_start",
            json!({
                "type": "message_start",
                "message": {
                    "id": response.id,
                    "type": "message",
                    "role": response.message.role,
                    "model": model_id,
                    "content": [],
                    "stop_reason": null,
                    "stop_sequence": null,
                    "usage": usage,
                },
            }),
        ),
        (
            "content_block_start",
            json!({
                "type": "content_block_start",
                "index": 0,
                "content_block": {"type": "text", "text": ""},
            }),
        ),
        (
            "content_block_delta",
            json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "text_delta", "text": response.message.content},
            }),
        ),
        (
            "content_block_stop",
            json!({
                "type": "content_block_stop",
                "index": 0,
            }),
        ),
        (
            "message_delta",
            json!({
                "type": "message_delta",
                "delta": {"stop_reason": response.finish_reason, "stop_sequence": null},
                "usage": usage,
            }),
        ),
        ("message_stop", json!({"type": "message_stop"})),
    ]
}
