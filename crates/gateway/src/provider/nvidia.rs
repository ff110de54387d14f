//! Composite adapter for NVIDIA's multi-style endpoint.
//!
//! A single base URL and credential serve models speaking either dialect;
//! requests are routed per model to an inner OpenAI or Claude adapter. The
//! composite owns the inner adapters, it does not subclass them.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;

use config::{ApiStyle, ProviderConfig};

use crate::{
    error::{GatewayError, Result},
    provider::{Provider, claude::ClaudeProvider, openai::OpenAiProvider},
    unified::{ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, ModelDescriptor},
};

#[derive(Debug)]
pub(crate) struct NvidiaProvider {
    name: String,
    models: Vec<ModelDescriptor>,
    styles: HashMap<String, ApiStyle>,
    openai: Option<OpenAiProvider>,
    claude: Option<ClaudeProvider>,
}

impl NvidiaProvider {
    pub(crate) fn new(name: &str, config: &ProviderConfig, client: Client) -> anyhow::Result<Self> {
        let mut openai_models = Vec::new();
        let mut claude_models = Vec::new();
        let mut models = Vec::with_capacity(config.models.len());
        let mut styles = HashMap::with_capacity(config.models.len());

        for model in &config.models {
            models.push(ModelDescriptor {
                id: model.id.clone(),
                provider: name.to_string(),
                api_style: model.api_style,
            });
            styles.insert(model.id.clone(), model.api_style);

            match model.api_style {
                ApiStyle::Openai => openai_models.push(model.clone()),
                ApiStyle::Claude => claude_models.push(model.clone()),
            }
        }

        let openai = if openai_models.is_empty() {
            None
        } else {
            let mut inner_config = config.clone();
            inner_config.models = openai_models;
            Some(OpenAiProvider::new(name, &inner_config, client.clone())?)
        };

        let claude = if claude_models.is_empty() {
            None
        } else {
            let mut inner_config = config.clone();
            inner_config.models = claude_models;
            Some(ClaudeProvider::new(name, &inner_config, client)?)
        };

        Ok(Self {
            name: name.to_string(),
            models,
            styles,
            openai,
            claude,
        })
    }

    fn style_of(&self, model: &str) -> Result<ApiStyle> {
        self.styles
            .get(model)
            .copied()
            .ok_or_else(|| GatewayError::UnknownModel(model.to_string()))
    }
}

#[async_trait]
impl Provider for NvidiaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> Vec<ModelDescriptor> {
        self.models.clone()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        match self.style_of(&request.model)? {
            ApiStyle::Openai => match &self.openai {
                Some(adapter) => adapter.chat(request).await,
                None => {
                    log::error!("model {} routed as openai style but adapter missing", request.model);
                    Err(GatewayError::Internal(None))
                }
            },
            ApiStyle::Claude => match &self.claude {
                Some(adapter) => adapter.chat(request).await,
                None => {
                    log::error!("model {} routed as claude style but adapter missing", request.model);
                    Err(GatewayError::Internal(None))
                }
            },
        }
    }

    async fn completion(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        match self.style_of(&request.model)? {
            ApiStyle::Openai => match &self.openai {
                Some(adapter) => adapter.completion(request).await,
                None => {
                    log::error!("model {} routed as openai style but adapter missing", request.model);
                    Err(GatewayError::Internal(None))
                }
            },
            ApiStyle::Claude => Err(GatewayError::UnsupportedOperation(format!(
                "model {} uses the claude api style which does not support completions",
                request.model
            ))),
        }
    }
}
