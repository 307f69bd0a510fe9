// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Custom/local endpoint driver — Ollama, vLLM, LM Studio, and any other
//! self-hosted OpenAI-compatible server.
//!
//! This provider deliberately rejects recognisable cloud model names so that
//! requests for them route to the aggregator when both are configured.  It
//! accepts plain vendor-prefix-free names, names carrying a local marker
//! (`local`, `ollama`, `vllm`, `lmstudio`), and anything the registry flags
//! `is_custom`.  Trailing `:tag` suffixes are stripped before lookup, the
//! way local runners version their models.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::capabilities::{ModelCapabilities, ModelResponse, ProviderKind};
use crate::catalog::ModelRegistry;
use crate::error::ProviderError;
use crate::openai_compat::{build_chat_body, AuthStyle, OpenAiCompat};
use crate::provider::{allowed_by_policy, GenerateOptions, ModelProvider, ModelTable};
use crate::restrictions;
use crate::retry::with_retries;

/// Conservative context window for models absent from the registry.
const GENERIC_CONTEXT_WINDOW: u32 = 32_768;

/// Name fragments that mark a model as local regardless of the registry.
const LOCAL_MARKERS: [&str; 4] = ["local", "ollama", "vllm", "lmstudio"];

#[derive(Debug)]
pub struct CustomProvider {
    wire: OpenAiCompat,
    registry: Arc<ModelRegistry>,
    /// Registry entries flagged `is_custom`.
    table: ModelTable,
    /// When the aggregator is configured, cloud models found in the registry
    /// are deferred to it.  Captured at construction so resolution stays pure.
    aggregator_configured: bool,
}

impl CustomProvider {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        registry: Arc<ModelRegistry>,
        aggregator_configured: bool,
    ) -> Result<Self, ProviderError> {
        if base_url.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "custom provider requires a base URL (CUSTOM_API_URL)".into(),
            ));
        }
        let auth = match &api_key {
            Some(k) if !k.is_empty() => AuthStyle::Bearer,
            _ => AuthStyle::None,
        };
        let entries: Vec<ModelCapabilities> = registry
            .table()
            .iter()
            .filter(|(_, caps)| caps.is_custom)
            .map(|(_, caps)| caps.clone())
            .collect();
        Ok(Self {
            wire: OpenAiCompat::new(ProviderKind::Custom, &base_url, api_key, auth, vec![]),
            registry,
            table: ModelTable::new(entries)?,
            aggregator_configured,
        })
    }

    /// Strip a trailing `:tag` (e.g. `llama3.2:latest` → `llama3.2`).
    fn strip_tag(name: &str) -> &str {
        match name.split_once(':') {
            Some((base, _)) => base,
            None => name,
        }
    }

    fn generic_capabilities(&self, name: &str) -> ModelCapabilities {
        ModelCapabilities {
            friendly_name: format!("Custom ({name})"),
            context_window: GENERIC_CONTEXT_WINDOW,
            max_output_tokens: 8_192,
            is_generic: true,
            ..ModelCapabilities::new(ProviderKind::Custom, name)
        }
    }
}

#[async_trait]
impl ModelProvider for CustomProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }

    fn friendly_name(&self) -> &str {
        "Custom API"
    }

    fn table(&self) -> &ModelTable {
        &self.table
    }

    fn resolve_model_name(&self, name_or_alias: &str) -> String {
        // Registry first, as given.
        if let Some(caps) = self.registry.resolve(name_or_alias) {
            return caps.model_name.clone();
        }
        // Then with the version tag stripped.
        let stripped = Self::strip_tag(name_or_alias);
        if let Some(caps) = self.registry.resolve(stripped) {
            return caps.model_name.clone();
        }
        stripped.to_string()
    }

    fn capabilities(&self, name_or_alias: &str) -> Result<ModelCapabilities, ProviderError> {
        let canonical = self.resolve_model_name(name_or_alias);
        let allowed = match self.table.get(&canonical) {
            Some(_) => allowed_by_policy(&self.table, self.kind(), &canonical, name_or_alias),
            None => {
                restrictions::service().is_allowed(self.kind(), &canonical, Some(name_or_alias))
            }
        };
        if !allowed {
            return Err(ProviderError::Restricted {
                provider: self.kind(),
                model: name_or_alias.to_string(),
            });
        }
        if let Some(caps) = self.registry.capabilities(&canonical) {
            // A registry hit served through this endpoint carries the
            // custom provider tag regardless of its registry origin.
            return Ok(ModelCapabilities {
                provider: ProviderKind::Custom,
                ..caps
            });
        }
        Ok(self.generic_capabilities(&canonical))
    }

    fn validate(&self, name_or_alias: &str) -> bool {
        let stripped = Self::strip_tag(name_or_alias);

        if let Some(caps) = self
            .registry
            .resolve(name_or_alias)
            .or_else(|| self.registry.resolve(stripped))
        {
            if caps.is_custom {
                return allowed_by_policy(
                    &self.table,
                    self.kind(),
                    &caps.model_name,
                    name_or_alias,
                );
            }
            // A cloud model: defer to the aggregator when one is configured,
            // reject outright otherwise.
            debug!(
                model = name_or_alias,
                deferred = self.aggregator_configured,
                "cloud model refused by custom provider"
            );
            return false;
        }

        let lower = stripped.to_lowercase();
        let looks_local = LOCAL_MARKERS.iter().any(|m| lower.contains(m))
            || !stripped.contains('/');
        if !looks_local {
            debug!(model = name_or_alias, "rejected by custom provider (vendor-prefixed name)");
            return false;
        }
        restrictions::service().is_allowed(self.kind(), stripped, Some(name_or_alias))
    }

    async fn generate(
        &self,
        prompt: &str,
        name_or_alias: &str,
        options: &GenerateOptions,
    ) -> Result<ModelResponse, ProviderError> {
        if !self.validate(name_or_alias) {
            return Err(ProviderError::NotSupported {
                provider: self.kind(),
                model: name_or_alias.to_string(),
            });
        }
        let caps = self.capabilities(name_or_alias)?;
        let canonical = caps.model_name.clone();
        let body = build_chat_body(&caps, &canonical, prompt, options);

        let completion =
            with_retries(ProviderKind::Custom, &canonical, || self.wire.chat(&body)).await?;

        let mut metadata = serde_json::Map::new();
        if let Some(reason) = &completion.finish_reason {
            metadata.insert("finish_reason".into(), json!(reason));
        }
        metadata.insert("model".into(), json!(completion.model));

        Ok(ModelResponse {
            content: completion.content,
            usage: completion.usage,
            model_name: canonical,
            friendly_name: self.friendly_name().to_string(),
            provider: ProviderKind::Custom,
            metadata,
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<ModelRegistry> {
        let json = r#"{
            "models": [
                { "model_name": "llama3.2", "aliases": ["llama"],
                  "context_window": 8192, "max_output_tokens": 2048, "is_custom": true },
                { "model_name": "anthropic/claude-opus-4", "aliases": ["opus"],
                  "context_window": 200000, "max_output_tokens": 32000 }
            ]
        }"#;
        Arc::new(ModelRegistry::from_json(json).unwrap())
    }

    fn provider(aggregator: bool) -> CustomProvider {
        CustomProvider::new(
            "http://localhost:11434/v1".into(),
            None,
            registry(),
            aggregator,
        )
        .unwrap()
    }

    #[test]
    fn missing_base_url_is_an_error() {
        let err = CustomProvider::new("".into(), None, registry(), false).unwrap_err();
        assert!(err.to_string().contains("base URL"));
    }

    #[test]
    fn version_tags_are_stripped_before_lookup() {
        crate::restrictions::reset();
        let p = provider(false);
        assert_eq!(p.resolve_model_name("llama3.2:latest"), "llama3.2");
        assert_eq!(p.resolve_model_name("llama:latest"), "llama3.2");
    }

    #[test]
    fn registry_custom_models_validate() {
        crate::restrictions::reset();
        let p = provider(false);
        assert!(p.validate("llama3.2"));
        assert!(p.validate("llama"));
    }

    #[test]
    fn cloud_models_are_always_refused() {
        crate::restrictions::reset();
        // With an aggregator configured the model routes there instead...
        assert!(!provider(true).validate("opus"));
        // ...and without one it is still refused here.
        assert!(!provider(false).validate("anthropic/claude-opus-4"));
    }

    #[test]
    fn local_markers_admit_unknown_models() {
        crate::restrictions::reset();
        let p = provider(false);
        assert!(p.validate("my-ollama-build"));
        assert!(p.validate("vllm-test:v2"));
    }

    #[test]
    fn plain_names_without_vendor_prefix_are_accepted() {
        crate::restrictions::reset();
        let p = provider(false);
        assert!(p.validate("some-fine-tune"));
    }

    #[test]
    fn vendor_prefixed_unknown_names_are_rejected() {
        crate::restrictions::reset();
        let p = provider(false);
        assert!(!p.validate("bigvendor/new-cloud-model"));
    }

    #[test]
    fn unknown_local_model_gets_generic_capabilities() {
        crate::restrictions::reset();
        let p = provider(false);
        let caps = p.capabilities("some-fine-tune").unwrap();
        assert!(caps.is_generic);
        assert_eq!(caps.provider, ProviderKind::Custom);
    }
}
