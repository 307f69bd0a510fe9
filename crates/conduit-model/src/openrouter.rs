// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenRouter driver — the aggregator gateway.
//!
//! OpenRouter fronts many upstream vendors behind one OpenAI-compatible API,
//! so this provider accepts any model name by default.  Capability records
//! come from the shared custom-models registry; a model the registry does
//! not know receives generic-conservative capabilities marked as such, which
//! makes parameter validation advisory rather than authoritative.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::capabilities::{ModelCapabilities, ModelResponse, ProviderKind};
use crate::catalog::ModelRegistry;
use crate::error::ProviderError;
use crate::openai_compat::{build_chat_body, AuthStyle, OpenAiCompat};
use crate::provider::{allowed_by_policy, GenerateOptions, ModelProvider, ModelTable};
use crate::restrictions;
use crate::retry::with_retries;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Conservative context window assumed for models the registry does not know.
const GENERIC_CONTEXT_WINDOW: u32 = 32_768;

pub struct OpenRouterProvider {
    wire: OpenAiCompat,
    registry: Arc<ModelRegistry>,
    /// Registry entries served by the aggregator (is_custom entries belong
    /// to the custom provider).
    table: ModelTable,
}

impl OpenRouterProvider {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        registry: Arc<ModelRegistry>,
    ) -> Result<Self, ProviderError> {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let entries: Vec<ModelCapabilities> = registry
            .table()
            .iter()
            .filter(|(_, caps)| !caps.is_custom)
            .map(|(_, caps)| caps.clone())
            .collect();
        Ok(Self {
            wire: OpenAiCompat::new(
                ProviderKind::OpenRouter,
                &base,
                Some(api_key),
                AuthStyle::Bearer,
                vec![
                    ("HTTP-Referer".into(), "https://github.com/svenai/conduit".into()),
                    ("X-Title".into(), "conduit".into()),
                ],
            ),
            registry,
            table: ModelTable::new(entries)?,
        })
    }

    /// Generic-conservative capabilities for a model the registry does not
    /// know.  Flagged `is_generic` so downstream validation stays advisory.
    fn generic_capabilities(&self, name: &str) -> ModelCapabilities {
        ModelCapabilities {
            friendly_name: format!("OpenRouter ({name})"),
            context_window: GENERIC_CONTEXT_WINDOW,
            max_output_tokens: 8_192,
            is_generic: true,
            ..ModelCapabilities::new(ProviderKind::OpenRouter, name)
        }
    }
}

#[async_trait]
impl ModelProvider for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    fn friendly_name(&self) -> &str {
        "OpenRouter"
    }

    fn table(&self) -> &ModelTable {
        &self.table
    }

    fn capabilities(&self, name_or_alias: &str) -> Result<ModelCapabilities, ProviderError> {
        let canonical = self.resolve_model_name(name_or_alias);
        let allowed = match self.table.get(&canonical) {
            Some(_) => allowed_by_policy(&self.table, self.kind(), &canonical, name_or_alias),
            // Unknown to the registry: only the raw names can be tested.
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
        match self.table.get(&canonical) {
            Some(caps) => Ok(caps.clone()),
            None => Ok(self.generic_capabilities(&canonical)),
        }
    }

    /// Any model name is acceptable to the aggregator, so validation is a
    /// policy check plus a refusal of custom-endpoint-only models (those
    /// belong to the custom provider).
    fn validate(&self, name_or_alias: &str) -> bool {
        if let Some(caps) = self.registry.resolve(name_or_alias) {
            if caps.is_custom {
                return false;
            }
        }
        self.capabilities(name_or_alias).is_ok()
    }

    async fn generate(
        &self,
        prompt: &str,
        name_or_alias: &str,
        options: &GenerateOptions,
    ) -> Result<ModelResponse, ProviderError> {
        if !self.validate(name_or_alias) {
            return Err(ProviderError::Restricted {
                provider: self.kind(),
                model: name_or_alias.to_string(),
            });
        }
        let caps = self.capabilities(name_or_alias)?;
        let canonical = caps.model_name.clone();
        let body = build_chat_body(&caps, &canonical, prompt, options);

        let completion =
            with_retries(ProviderKind::OpenRouter, &canonical, || self.wire.chat(&body)).await?;

        let mut metadata = serde_json::Map::new();
        if let Some(reason) = &completion.finish_reason {
            metadata.insert("finish_reason".into(), json!(reason));
        }
        metadata.insert("model".into(), json!(completion.model));
        metadata.insert("id".into(), json!(completion.id));
        if caps.is_generic {
            metadata.insert("generic_capabilities".into(), json!(true));
        }

        Ok(ModelResponse {
            content: completion.content,
            usage: completion.usage,
            model_name: canonical,
            friendly_name: self.friendly_name().to_string(),
            provider: ProviderKind::OpenRouter,
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
                { "model_name": "anthropic/claude-opus-4", "aliases": ["opus"],
                  "context_window": 200000, "max_output_tokens": 32000 },
                { "model_name": "local-llama", "aliases": ["llama"],
                  "context_window": 8192, "max_output_tokens": 2048, "is_custom": true }
            ]
        }"#;
        Arc::new(ModelRegistry::from_json(json).unwrap())
    }

    fn provider() -> OpenRouterProvider {
        OpenRouterProvider::new("test-key".into(), None, registry()).unwrap()
    }

    #[test]
    fn registry_alias_resolves_to_canonical() {
        crate::restrictions::reset();
        let p = provider();
        assert_eq!(p.resolve_model_name("opus"), "anthropic/claude-opus-4");
    }

    #[test]
    fn unknown_model_gets_generic_capabilities() {
        crate::restrictions::reset();
        let p = provider();
        let caps = p.capabilities("vendor/some-new-model").unwrap();
        assert!(caps.is_generic);
        assert_eq!(caps.context_window, GENERIC_CONTEXT_WINDOW);
    }

    #[test]
    fn registry_model_gets_real_capabilities() {
        crate::restrictions::reset();
        let p = provider();
        let caps = p.capabilities("opus").unwrap();
        assert!(!caps.is_generic);
        assert_eq!(caps.context_window, 200_000);
    }

    #[test]
    fn custom_only_models_are_refused() {
        crate::restrictions::reset();
        let p = provider();
        assert!(!p.validate("local-llama"));
        assert!(!p.validate("llama"));
    }

    #[test]
    fn arbitrary_names_validate_by_default() {
        crate::restrictions::reset();
        let p = provider();
        assert!(p.validate("mistralai/mistral-large"));
    }

    #[test]
    fn table_excludes_custom_entries() {
        let p = provider();
        let models = p.table().canonical_names();
        assert!(models.contains(&"anthropic/claude-opus-4".to_string()));
        assert!(!models.contains(&"local-llama".to_string()));
    }
}
