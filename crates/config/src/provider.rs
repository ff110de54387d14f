use std::{collections::BTreeMap, fmt};

use secrecy::SecretString;
use serde::Deserialize;

/// Catalogue of the configured upstream providers.
///
/// The `openai` and `claude` providers are always present; `nvidia` fronts a
/// single endpoint whose models may speak either dialect.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// OpenAI-compatible upstream.
    pub openai: ProviderConfig,
    /// Anthropic Claude upstream.
    pub claude: ProviderConfig,
    /// Optional NVIDIA multi-style upstream.
    #[serde(default)]
    pub nvidia: Option<ProviderConfig>,
}

/// Authentication and routing information for one upstream provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key sent to the upstream. Never logged.
    pub api_key: SecretString,
    /// Base URL of the upstream endpoint.
    pub base_url: String,
    /// Models exposed by this provider.
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// Additional HTTP headers to send with every upstream request.
    /// Header names are restricted to ASCII letters and `-`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Alternative model identifiers resolving to configured models.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// A model exposed by a provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Canonical model identifier understood by the upstream.
    pub id: String,
    /// Wire dialect the model speaks.
    pub api_style: ApiStyle,
}

/// Wire dialect of an upstream model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStyle {
    /// OpenAI `/chat/completions` and `/completions` JSON.
    Openai,
    /// Anthropic `/v1/messages` JSON.
    Claude,
}

impl fmt::Display for ApiStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiStyle::Openai => f.write_str("openai"),
            ApiStyle::Claude => f.write_str("claude"),
        }
    }
}
