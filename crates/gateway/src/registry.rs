//! Model registry mapping identifiers (and aliases) to providers.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use anyhow::bail;

use crate::{
    error::{GatewayError, Result},
    provider::Provider,
    unified::ModelDescriptor,
};

/// Maps model ids and alias keys to `(descriptor, adapter)` pairs.
///
/// Populated once during a build cycle, then read-only while live; a fresh
/// registry replaces it wholesale on hot reload.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    models: HashMap<String, ModelEntry>,
    providers: HashMap<String, Arc<dyn Provider>>,
}

#[derive(Clone)]
struct ModelEntry {
    descriptor: ModelDescriptor,
    provider: Arc<dyn Provider>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, its models, and its aliases.
    ///
    /// Registration is atomic: every insert is staged and validated before
    /// the batch commits, so a failure leaves the registry untouched.
    pub fn register_provider(
        &self,
        provider: Arc<dyn Provider>,
        aliases: &BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());

        if inner.providers.contains_key(provider.name()) {
            bail!("provider {:?} already registered", provider.name());
        }

        let mut staged = HashMap::new();

        for descriptor in provider.models() {
            if inner.models.contains_key(&descriptor.id) || staged.contains_key(&descriptor.id) {
                bail!("model already registered: {}", descriptor.id);
            }

            staged.insert(
                descriptor.id.clone(),
                ModelEntry {
                    descriptor,
                    provider: Arc::clone(&provider),
                },
            );
        }

        let mut staged_aliases = HashMap::new();

        for (alias, target) in aliases {
            if inner.models.contains_key(alias) || staged.contains_key(alias) || staged_aliases.contains_key(alias) {
                bail!("alias {alias:?} conflicts with an existing model");
            }

            let Some(entry) = staged.get(target).or_else(|| inner.models.get(target)) else {
                bail!("alias {alias:?} references unknown model {target:?}");
            };

            staged_aliases.insert(alias.clone(), entry.clone());
        }

        inner.providers.insert(provider.name().to_string(), provider);
        inner.models.extend(staged);
        inner.models.extend(staged_aliases);

        Ok(())
    }

    /// Resolve a model id or alias to its descriptor and adapter.
    pub fn lookup(&self, model_id: &str) -> Result<(ModelDescriptor, Arc<dyn Provider>)> {
        let inner = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());

        inner
            .models
            .get(model_id)
            .map(|entry| (entry.descriptor.clone(), Arc::clone(&entry.provider)))
            .ok_or_else(|| GatewayError::UnknownModel(model_id.to_string()))
    }

    /// Number of registered model keys, aliases included.
    pub fn model_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.models.len()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::Result,
        unified::{ApiStyle, ChatRequest, ChatResponse, CompletionRequest, CompletionResponse},
    };

    #[derive(Debug)]
    struct StubProvider {
        name: String,
        models: Vec<ModelDescriptor>,
    }

    impl StubProvider {
        fn new(name: &str, model_ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                models: model_ids
                    .iter()
                    .map(|id| ModelDescriptor {
                        id: (*id).to_string(),
                        provider: name.to_string(),
                        api_style: ApiStyle::Openai,
                    })
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn models(&self) -> Vec<ModelDescriptor> {
            self.models.clone()
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            Err(GatewayError::Internal(None))
        }

        async fn completion(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Err(GatewayError::Internal(None))
        }
    }

    fn aliases(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn lookup_resolves_models_and_aliases_to_the_same_descriptor() {
        let registry = Registry::new();
        registry
            .register_provider(StubProvider::new("openai", &["m1"]), &aliases(&[("alias-x", "m1")]))
            .unwrap();

        let (by_id, _) = registry.lookup("m1").unwrap();
        let (by_alias, _) = registry.lookup("alias-x").unwrap();

        assert_eq!(by_id, by_alias);
        assert_eq!(by_alias.id, "m1");
    }

    #[test]
    fn unknown_model_lookup_fails() {
        let registry = Registry::new();
        registry.register_provider(StubProvider::new("openai", &["m1"]), &BTreeMap::new()).unwrap();

        let error = registry.lookup("m2").unwrap_err();

        assert_eq!(error.to_string(), "unknown model: m2");
    }

    #[test]
    fn duplicate_model_ids_abort_registration() {
        let registry = Registry::new();
        registry.register_provider(StubProvider::new("openai", &["m1"]), &BTreeMap::new()).unwrap();

        let error = registry
            .register_provider(StubProvider::new("claude", &["m1"]), &BTreeMap::new())
            .unwrap_err();

        assert_eq!(error.to_string(), "model already registered: m1");
    }

    #[test]
    fn duplicate_provider_names_are_rejected() {
        let registry = Registry::new();
        registry.register_provider(StubProvider::new("openai", &["m1"]), &BTreeMap::new()).unwrap();

        let error = registry
            .register_provider(StubProvider::new("openai", &["m2"]), &BTreeMap::new())
            .unwrap_err();

        assert_eq!(error.to_string(), r#"provider "openai" already registered"#);
    }

    #[test]
    fn alias_conflicting_with_model_is_rejected() {
        let registry = Registry::new();

        let error = registry
            .register_provider(StubProvider::new("openai", &["m1", "m2"]), &aliases(&[("m2", "m1")]))
            .unwrap_err();

        assert_eq!(error.to_string(), r#"alias "m2" conflicts with an existing model"#);
    }

    #[test]
    fn alias_to_unknown_target_is_rejected() {
        let registry = Registry::new();

        let error = registry
            .register_provider(StubProvider::new("openai", &["m1"]), &aliases(&[("alias-x", "m9")]))
            .unwrap_err();

        assert_eq!(error.to_string(), r#"alias "alias-x" references unknown model "m9""#);
    }

    #[test]
    fn failed_registration_leaves_the_registry_untouched() {
        let registry = Registry::new();
        registry
            .register_provider(StubProvider::new("openai", &["m1"]), &aliases(&[("alias-x", "m1")]))
            .unwrap();
        let before = registry.model_count();

        // Models stage before the bad alias is discovered; none of them may
        // survive the failure.
        let error = registry
            .register_provider(StubProvider::new("claude", &["c1", "c2"]), &aliases(&[("alias-y", "missing")]))
            .unwrap_err();

        assert!(error.to_string().contains("references unknown model"));
        assert_eq!(registry.model_count(), before);
        assert!(registry.lookup("c1").is_err());
        assert!(registry.lookup("c2").is_err());
        assert!(registry.lookup("alias-y").is_err());

        // The provider name also stays free for a later, valid registration.
        registry.register_provider(StubProvider::new("claude", &["c1"]), &BTreeMap::new()).unwrap();
    }

    #[test]
    fn alias_may_target_a_model_from_the_same_registration() {
        let registry = Registry::new();
        registry
            .register_provider(StubProvider::new("openai", &["m1"]), &aliases(&[("alias-x", "m1")]))
            .unwrap();

        assert_eq!(registry.lookup("alias-x").unwrap().0.id, "m1");
    }
}
