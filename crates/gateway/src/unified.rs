//! Provider-agnostic request and response types.
//!
//! These sit between the protocol translators and the upstream adapters so
//! that everything downstream of ingress parsing is monomorphic over provider
//! dialects. Multi-segment wire content is flattened into single strings at
//! parse time and never reconstructed here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use config::ApiStyle;

/// Conversational role in the canonical schema.
///
/// The full set is accepted at this layer; adapters restrict further (the
/// Claude dialect only forwards `user` and `assistant` turns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Tool response (forwarded verbatim on the OpenAI dialect).
    Tool,
}

/// A single conversational message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Canonical chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Target model identifier. May be an alias until the dispatcher
    /// rewrites it to the canonical id.
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub options: RequestOptions,
}

/// Canonical chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub id: String,
    pub message: Message,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

/// Canonical legacy text completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub max_tokens: Option<u32>,
    /// Kept as an `Option` so an explicit zero survives to the upstream.
    pub temperature: Option<f64>,
    pub options: RequestOptions,
}

/// Canonical legacy text completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

/// Token accounting information. Zero when the upstream omits it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0 && self.total_tokens == 0
    }
}

/// Identifies a registered model and the dialect it speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Canonical id understood by the upstream. Aliases resolve to this.
    pub id: String,
    /// Name of the provider serving the model.
    pub provider: String,
    pub api_style: ApiStyle,
}

/// A tagged option value carried through the canonical layer.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Integer(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    Map(serde_json::Map<String, Value>),
    /// Opaque JSON forwarded without interpretation (`tools`, `tool_choice`).
    Raw(Value),
}

/// Heterogeneous options bag mapping recognized tuning keys to values.
///
/// Extractors are per-key and lenient on numeric representation: integers,
/// floats, and decimal strings are all accepted where a number is expected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    entries: BTreeMap<String, OptionValue>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: OptionValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.entries.get(key)? {
            OptionValue::Integer(value) => Some(*value),
            OptionValue::Float(value) => Some(*value as i64),
            OptionValue::String(value) => {
                let value = value.trim();
                value.parse::<i64>().ok().or_else(|| value.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        match self.entries.get(key)? {
            OptionValue::Integer(value) => Some(*value as f64),
            OptionValue::Float(value) => Some(*value),
            OptionValue::String(value) => value.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            OptionValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn string_list(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key)? {
            OptionValue::StringList(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn map(&self, key: &str) -> Option<&serde_json::Map<String, Value>> {
        match self.entries.get(key)? {
            OptionValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        match self.entries.get(key)? {
            OptionValue::Raw(value) => Some(value),
            _ => None,
        }
    }

    /// Mapping of string keys to floats, accepting any numeric encoding for
    /// the values. Returns `None` if any value is non-numeric.
    pub fn float_map(&self, key: &str) -> Option<BTreeMap<String, f64>> {
        let OptionValue::Map(map) = self.entries.get(key)? else {
            return None;
        };

        let mut out = BTreeMap::new();

        for (name, value) in map {
            out.insert(name.clone(), value.as_f64()?);
        }

        Some(out)
    }
}
