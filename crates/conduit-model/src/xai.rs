// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! X.AI GROK driver (api.x.ai) — plain OpenAI-compatible wire format.

use async_trait::async_trait;
use serde_json::json;

use crate::capabilities::{
    ModelCapabilities, ModelResponse, ProviderKind, TemperatureConstraint,
};
use crate::error::ProviderError;
use crate::openai_compat::{build_chat_body, AuthStyle, OpenAiCompat};
use crate::provider::{first_allowed, GenerateOptions, ModelProvider, ModelTable};
use crate::retry::with_retries;
use crate::selection::ToolModelCategory;

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";

pub struct XAiProvider {
    wire: OpenAiCompat,
    table: ModelTable,
}

fn builtin_models() -> Vec<ModelCapabilities> {
    vec![
        ModelCapabilities {
            friendly_name: "X.AI (Grok 3)".into(),
            aliases: vec!["grok".into(), "grok3".into()],
            context_window: 131_072,
            max_output_tokens: 131_072,
            supports_function_calling: true,
            description: "GROK-3 (131K context) - Advanced reasoning model from X.AI, \
                          excellent for complex analysis"
                .into(),
            temperature: TemperatureConstraint::range(0.0, 2.0, 0.7),
            ..ModelCapabilities::new(ProviderKind::XAi, "grok-3")
        },
        ModelCapabilities {
            friendly_name: "X.AI (Grok 3 Fast)".into(),
            aliases: vec!["grok3fast".into(), "grokfast".into(), "grok3-fast".into()],
            context_window: 131_072,
            max_output_tokens: 131_072,
            supports_function_calling: true,
            description: "GROK-3 Fast (131K context) - Higher performance variant, faster \
                          processing but more expensive"
                .into(),
            temperature: TemperatureConstraint::range(0.0, 2.0, 0.7),
            ..ModelCapabilities::new(ProviderKind::XAi, "grok-3-fast")
        },
    ]
}

impl XAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            wire: OpenAiCompat::new(
                ProviderKind::XAi,
                &base,
                Some(api_key),
                AuthStyle::Bearer,
                vec![],
            ),
            table: ModelTable::new(builtin_models()).expect("builtin X.AI model table is valid"),
        }
    }
}

#[async_trait]
impl ModelProvider for XAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::XAi
    }

    fn friendly_name(&self) -> &str {
        "X.AI"
    }

    fn table(&self) -> &ModelTable {
        &self.table
    }

    fn preferred_model(&self, category: ToolModelCategory) -> Option<String> {
        let candidates: &[&str] = match category {
            ToolModelCategory::FastResponse => &["grok-3-fast", "grok-3"],
            ToolModelCategory::Balanced | ToolModelCategory::ExtendedReasoning => {
                &["grok-3", "grok-3-fast"]
            }
        };
        first_allowed(&self.table, self.kind(), candidates)
            .or_else(|| crate::provider::generic_preferred(&self.table, self.kind(), category))
    }

    async fn generate(
        &self,
        prompt: &str,
        name_or_alias: &str,
        options: &GenerateOptions,
    ) -> Result<ModelResponse, ProviderError> {
        let caps = self.capabilities(name_or_alias)?;
        let canonical = caps.model_name.clone();
        let body = build_chat_body(&caps, &canonical, prompt, options);

        let completion = with_retries(ProviderKind::XAi, &canonical, || self.wire.chat(&body))
            .await?;

        let mut metadata = serde_json::Map::new();
        if let Some(reason) = &completion.finish_reason {
            metadata.insert("finish_reason".into(), json!(reason));
        }
        metadata.insert("model".into(), json!(completion.model));
        metadata.insert("id".into(), json!(completion.id));

        Ok(ModelResponse {
            content: completion.content,
            usage: completion.usage,
            model_name: canonical,
            friendly_name: self.friendly_name().to_string(),
            provider: ProviderKind::XAi,
            metadata,
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
