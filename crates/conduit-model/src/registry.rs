// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Process-wide provider registry.
//!
//! The registry maps provider kinds to factories, constructs instances
//! lazily (a factory returns `None` when its credentials are absent), and
//! answers "which provider owns model X?" by walking a fixed priority order:
//! native providers first, then the aggregator, then custom/local, then
//! hosted.  Providers are added only by explicit [`ProviderRegistry::register`];
//! resolution never registers anything as a side effect — a bare alias like
//! `"flash"` must not conjure a native provider whose credentials are absent.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, info};

use crate::capabilities::ProviderKind;
use crate::catalog::ModelRegistry;
use crate::custom::CustomProvider;
use crate::dial::DialProvider;
use crate::error::ProviderError;
use crate::google::GoogleProvider;
use crate::openai::OpenAiProvider;
use crate::openrouter::OpenRouterProvider;
use crate::provider::ModelProvider;
use crate::selection::ToolModelCategory;
use crate::xai::XAiProvider;

/// Builds a provider instance, or `None` when its credentials are absent.
pub type ProviderFactory =
    Arc<dyn Fn() -> Result<Option<Arc<dyn ModelProvider>>, ProviderError> + Send + Sync>;

#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<ProviderKind, ProviderFactory>,
    instances: HashMap<ProviderKind, Arc<dyn ModelProvider>>,
    /// Kinds whose factory already reported missing credentials; avoids
    /// re-running factories on every lookup.
    unavailable: HashSet<ProviderKind>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a provider kind, replacing any previous one
    /// and dropping a cached instance built from it.
    pub fn register(&mut self, kind: ProviderKind, factory: ProviderFactory) {
        self.factories.insert(kind, factory);
        self.instances.remove(&kind);
        self.unavailable.remove(&kind);
    }

    /// Register the standard env-credentialed factories for all six kinds.
    ///
    /// The custom-models registry file is loaded once here; malformed JSON
    /// or duplicate aliases abort startup.
    pub fn register_from_env(
        &mut self,
        custom_models_path: Option<PathBuf>,
    ) -> Result<(), ProviderError> {
        let model_registry = Arc::new(ModelRegistry::load(custom_models_path.as_deref())?);

        self.register(
            ProviderKind::Google,
            Arc::new(|| {
                Ok(env_key("GEMINI_API_KEY").map(|key| {
                    Arc::new(GoogleProvider::new(key, env_key("GEMINI_BASE_URL")))
                        as Arc<dyn ModelProvider>
                }))
            }),
        );
        self.register(
            ProviderKind::OpenAi,
            Arc::new(|| {
                Ok(env_key("OPENAI_API_KEY").map(|key| {
                    Arc::new(OpenAiProvider::new(key, env_key("OPENAI_BASE_URL")))
                        as Arc<dyn ModelProvider>
                }))
            }),
        );
        self.register(
            ProviderKind::XAi,
            Arc::new(|| {
                Ok(env_key("XAI_API_KEY").map(|key| {
                    Arc::new(XAiProvider::new(key, env_key("XAI_BASE_URL")))
                        as Arc<dyn ModelProvider>
                }))
            }),
        );

        let registry_for_openrouter = Arc::clone(&model_registry);
        self.register(
            ProviderKind::OpenRouter,
            Arc::new(move || match env_key("OPENROUTER_API_KEY") {
                Some(key) => {
                    let provider = OpenRouterProvider::new(
                        key,
                        env_key("OPENROUTER_BASE_URL"),
                        Arc::clone(&registry_for_openrouter),
                    )?;
                    Ok(Some(Arc::new(provider) as Arc<dyn ModelProvider>))
                }
                None => Ok(None),
            }),
        );

        let registry_for_custom = Arc::clone(&model_registry);
        self.register(
            ProviderKind::Custom,
            Arc::new(move || match env_key("CUSTOM_API_URL") {
                Some(url) => {
                    let provider = CustomProvider::new(
                        url,
                        env_key("CUSTOM_API_KEY"),
                        Arc::clone(&registry_for_custom),
                        env_key("OPENROUTER_API_KEY").is_some(),
                    )?;
                    Ok(Some(Arc::new(provider) as Arc<dyn ModelProvider>))
                }
                None => Ok(None),
            }),
        );

        self.register(
            ProviderKind::Dial,
            Arc::new(|| {
                Ok(env_key("DIAL_API_KEY").map(|key| {
                    Arc::new(DialProvider::new(
                        key,
                        env_key("DIAL_API_HOST"),
                        env_key("DIAL_API_VERSION"),
                    )) as Arc<dyn ModelProvider>
                }))
            }),
        );

        Ok(())
    }

    /// The (cached) instance for a kind, constructing it on first use.
    pub fn provider(&mut self, kind: ProviderKind) -> Option<Arc<dyn ModelProvider>> {
        if let Some(instance) = self.instances.get(&kind) {
            return Some(Arc::clone(instance));
        }
        if self.unavailable.contains(&kind) {
            return None;
        }
        let factory = self.factories.get(&kind)?;
        match factory() {
            Ok(Some(instance)) => {
                info!(provider = %kind, "provider initialised");
                self.instances.insert(kind, Arc::clone(&instance));
                Some(instance)
            }
            Ok(None) => {
                debug!(provider = %kind, "credentials absent — provider unavailable");
                self.unavailable.insert(kind);
                None
            }
            Err(e) => {
                tracing::warn!(provider = %kind, error = %e, "provider factory failed");
                self.unavailable.insert(kind);
                None
            }
        }
    }

    /// First provider, in priority order, that validates the model name.
    pub fn provider_for_model(&mut self, name: &str) -> Option<Arc<dyn ModelProvider>> {
        for kind in ProviderKind::priority_order() {
            if let Some(provider) = self.provider(kind) {
                if provider.validate(name) {
                    return Some(provider);
                }
            }
        }
        None
    }

    /// Kinds whose credentials are present (instances constructible).
    pub fn available_providers(&mut self) -> Vec<ProviderKind> {
        ProviderKind::priority_order()
            .into_iter()
            .filter(|kind| self.provider(*kind).is_some())
            .collect()
    }

    /// Union of canonical model names across registered providers, mapped to
    /// the highest-priority provider that owns each name.
    pub fn available_models(
        &mut self,
        respect_restrictions: bool,
    ) -> BTreeMap<String, ProviderKind> {
        let mut out = BTreeMap::new();
        for kind in ProviderKind::priority_order() {
            if let Some(provider) = self.provider(kind) {
                for model in provider.list_models(respect_restrictions) {
                    out.entry(model).or_insert(kind);
                }
            }
        }
        out
    }

    /// Concrete model for an auto-mode category.
    ///
    /// Providers are consulted in priority order; each proposes its
    /// preferred, restriction-respecting model for the category.  The first
    /// proposal wins.  When nothing is available the error carries every
    /// model the registry can currently serve, so the caller's message is
    /// actionable.
    pub fn preferred_fallback(
        &mut self,
        category: ToolModelCategory,
    ) -> Result<String, ProviderError> {
        for kind in ProviderKind::priority_order() {
            if let Some(provider) = self.provider(kind) {
                if let Some(model) = provider.preferred_model(category) {
                    debug!(provider = %kind, model = %model, %category, "auto-mode selection");
                    return Ok(model);
                }
            }
        }
        let available: Vec<String> = self.available_models(true).into_keys().collect();
        Err(ProviderError::NoModelAvailable {
            category,
            available,
        })
    }

    /// Constructed instances, keyed by kind.  Used by restriction-policy
    /// validation at startup.
    pub fn registered_instances(&self) -> HashMap<ProviderKind, Arc<dyn ModelProvider>> {
        self.instances
            .iter()
            .map(|(k, v)| (*k, Arc::clone(v)))
            .collect()
    }

    /// Drop all factories and instances.  Tests that flip env vars call this
    /// between scenarios.
    pub fn clear(&mut self) {
        for instance in self.instances.values() {
            instance.close();
        }
        self.factories.clear();
        self.instances.clear();
        self.unavailable.clear();
    }
}

fn env_key(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

// ─── Process-wide registry ────────────────────────────────────────────────────

static REGISTRY: OnceLock<Mutex<ProviderRegistry>> = OnceLock::new();

/// The process-wide registry.  All mutation happens behind the mutex.
pub fn global() -> &'static Mutex<ProviderRegistry> {
    REGISTRY.get_or_init(|| Mutex::new(ProviderRegistry::new()))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ModelCapabilities;
    use crate::mock::MockProvider;

    fn mock_factory(kind: ProviderKind, models: Vec<ModelCapabilities>) -> ProviderFactory {
        Arc::new(move || {
            Ok(Some(
                Arc::new(MockProvider::new(kind, models.clone())) as Arc<dyn ModelProvider>
            ))
        })
    }

    fn caps(kind: ProviderKind, name: &str, aliases: &[&str]) -> ModelCapabilities {
        ModelCapabilities {
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            context_window: 100_000,
            max_output_tokens: 8_192,
            ..ModelCapabilities::new(kind, name)
        }
    }

    #[test]
    fn unregistered_registry_resolves_nothing() {
        let mut reg = ProviderRegistry::new();
        assert!(reg.provider_for_model("flash").is_none());
        assert!(reg.available_providers().is_empty());
    }

    #[test]
    fn factory_returning_none_is_not_registered_as_available() {
        let mut reg = ProviderRegistry::new();
        reg.register(ProviderKind::Google, Arc::new(|| Ok(None)));
        assert!(reg.provider(ProviderKind::Google).is_none());
        assert!(reg.available_providers().is_empty());
        // A lookup for a bare Google alias must not conjure the provider.
        assert!(reg.provider_for_model("flash").is_none());
    }

    #[test]
    fn provider_instances_are_cached() {
        crate::restrictions::reset();
        let mut reg = ProviderRegistry::new();
        reg.register(
            ProviderKind::XAi,
            mock_factory(ProviderKind::XAi, vec![caps(ProviderKind::XAi, "grok-3", &[])]),
        );
        let a = reg.provider(ProviderKind::XAi).unwrap();
        let b = reg.provider(ProviderKind::XAi).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn priority_order_decides_model_ownership() {
        crate::restrictions::reset();
        let mut reg = ProviderRegistry::new();
        // Both providers claim "shared"; Google outranks XAi.
        reg.register(
            ProviderKind::XAi,
            mock_factory(ProviderKind::XAi, vec![caps(ProviderKind::XAi, "shared", &[])]),
        );
        reg.register(
            ProviderKind::Google,
            mock_factory(
                ProviderKind::Google,
                vec![caps(ProviderKind::Google, "shared", &[])],
            ),
        );
        let provider = reg.provider_for_model("shared").unwrap();
        assert_eq!(provider.kind(), ProviderKind::Google);
    }

    #[test]
    fn available_models_keeps_highest_priority_owner() {
        crate::restrictions::reset();
        let mut reg = ProviderRegistry::new();
        reg.register(
            ProviderKind::XAi,
            mock_factory(ProviderKind::XAi, vec![caps(ProviderKind::XAi, "shared", &[])]),
        );
        reg.register(
            ProviderKind::Google,
            mock_factory(
                ProviderKind::Google,
                vec![caps(ProviderKind::Google, "shared", &[])],
            ),
        );
        let models = reg.available_models(true);
        assert_eq!(models.get("shared"), Some(&ProviderKind::Google));
    }

    #[test]
    fn preferred_fallback_errors_with_available_list_when_empty() {
        let mut reg = ProviderRegistry::new();
        let err = reg
            .preferred_fallback(ToolModelCategory::FastResponse)
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoModelAvailable { .. }));
    }

    #[test]
    fn clear_resets_everything() {
        crate::restrictions::reset();
        let mut reg = ProviderRegistry::new();
        reg.register(
            ProviderKind::XAi,
            mock_factory(ProviderKind::XAi, vec![caps(ProviderKind::XAi, "grok-3", &[])]),
        );
        assert!(!reg.available_providers().is_empty());
        reg.clear();
        assert!(reg.available_providers().is_empty());
        assert!(reg.provider_for_model("grok-3").is_none());
    }
}
