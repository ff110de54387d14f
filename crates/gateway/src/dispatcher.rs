//! Request dispatch: model lookup, sanitization, adapter invocation.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;

use config::Config;

use crate::{
    error::Result,
    provider::{claude::ClaudeProvider, nvidia::NvidiaProvider, openai::OpenAiProvider, upstream_client},
    registry::Registry,
    unified::{ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, ModelDescriptor},
};

/// Dispatches canonical requests to the adapter registered for their model.
///
/// Requests are sanitized before the adapter sees them: the model id is
/// rewritten to the canonical (non-alias) id, so adapters never see alias
/// names. The resolved descriptor is returned alongside the response so the
/// egress translator can echo the canonical id in its envelope.
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Resolve a model id or alias without dispatching.
    pub fn resolve(&self, model_id: &str) -> Result<ModelDescriptor> {
        self.registry.lookup(model_id).map(|(descriptor, _)| descriptor)
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<(ChatResponse, ModelDescriptor)> {
        let (descriptor, provider) = self.registry.lookup(&request.model)?;

        let sanitized = ChatRequest {
            model: descriptor.id.clone(),
            ..request
        };

        let response = provider.chat(sanitized).await?;

        Ok((response, descriptor))
    }

    pub async fn completion(&self, request: CompletionRequest) -> Result<(CompletionResponse, ModelDescriptor)> {
        let (descriptor, provider) = self.registry.lookup(&request.model)?;

        let sanitized = CompletionRequest {
            model: descriptor.id.clone(),
            ..request
        };

        let response = provider.completion(sanitized).await?;

        Ok((response, descriptor))
    }
}

/// Construct a dispatcher from configuration, registering every configured
/// provider with its own HTTP client and aliases.
pub fn build_dispatcher(config: &Config) -> anyhow::Result<Dispatcher> {
    let registry = Registry::new();

    let openai = OpenAiProvider::new("openai", &config.providers.openai, upstream_client()?)
        .context("initialise openai provider")?;
    registry
        .register_provider(Arc::new(openai), &config.providers.openai.aliases)
        .context("register openai provider")?;

    let claude = ClaudeProvider::new("claude", &config.providers.claude, upstream_client()?)
        .context("initialise claude provider")?;
    registry
        .register_provider(Arc::new(claude), &config.providers.claude.aliases)
        .context("register claude provider")?;

    if let Some(nvidia_config) = &config.providers.nvidia {
        let nvidia =
            NvidiaProvider::new("nvidia", nvidia_config, upstream_client()?).context("initialise nvidia provider")?;
        registry
            .register_provider(Arc::new(nvidia), &nvidia_config.aliases)
            .context("register nvidia provider")?;
    }

    Ok(Dispatcher::new(registry))
}
