// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenAI driver (api.openai.com).
//!
//! The o-series reasoning models reject the temperature parameter outright
//! and instead accept a reasoning budget, expressed here as a thinking-mode
//! fraction of a per-model token ceiling.  One model (`o3-pro`) is routed to
//! the responses endpoint, which takes a single composite input string
//! instead of a message list.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::capabilities::{
    ModelCapabilities, ModelResponse, ProviderKind, TemperatureConstraint, TokenUsage,
};
use crate::error::ProviderError;
use crate::openai_compat::{build_chat_body, AuthStyle, OpenAiCompat};
use crate::provider::{first_allowed, GenerateOptions, ModelProvider, ModelTable};
use crate::retry::with_retries;
use crate::selection::ToolModelCategory;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Canonical name routed to the responses endpoint.
const RESPONSES_ENDPOINT_MODEL: &str = "o3-pro-2025-06-10";

pub struct OpenAiProvider {
    wire: OpenAiCompat,
    base_url: String,
    table: ModelTable,
}

fn o_series(name: &str, thinking_ceiling: u32, description: &str) -> ModelCapabilities {
    ModelCapabilities {
        friendly_name: "OpenAI".into(),
        context_window: 200_000,
        max_output_tokens: 65_536,
        supports_function_calling: true,
        supports_images: true,
        max_image_size_mb: 20.0,
        supports_temperature: false,
        max_thinking_tokens: thinking_ceiling,
        description: description.into(),
        temperature: TemperatureConstraint::fixed(1.0),
        ..ModelCapabilities::new(ProviderKind::OpenAi, name)
    }
}

fn builtin_models() -> Vec<ModelCapabilities> {
    vec![
        ModelCapabilities {
            aliases: vec![],
            ..o_series(
                "o3",
                65_536,
                "Strong reasoning (200K context) - Logical problems, code generation, \
                 systematic analysis",
            )
        },
        ModelCapabilities {
            aliases: vec!["o3mini".into()],
            ..o_series(
                "o3-mini",
                32_768,
                "Fast O3 variant (200K context) - Balanced performance/speed, moderate \
                 complexity",
            )
        },
        ModelCapabilities {
            aliases: vec!["o3-pro".into()],
            ..o_series(
                RESPONSES_ENDPOINT_MODEL,
                65_536,
                "Professional-grade reasoning (200K context) - EXTREMELY EXPENSIVE: only for \
                 the most complex problems, or when the user explicitly asks for this model",
            )
        },
        ModelCapabilities {
            aliases: vec!["mini".into(), "o4mini".into()],
            ..o_series(
                "o4-mini",
                32_768,
                "Latest reasoning model (200K context) - Optimized for shorter contexts, rapid \
                 reasoning",
            )
        },
        ModelCapabilities {
            aliases: vec!["o4minihigh".into(), "o4minihi".into()],
            ..o_series(
                "o4-mini-high",
                65_536,
                "Enhanced O4 mini (200K context) - Higher reasoning effort for complex tasks",
            )
        },
        ModelCapabilities {
            friendly_name: "OpenAI".into(),
            aliases: vec!["gpt4.1".into()],
            context_window: 1_000_000,
            max_output_tokens: 32_768,
            supports_function_calling: true,
            supports_images: true,
            max_image_size_mb: 20.0,
            description: "GPT-4.1 (1M context) - Advanced reasoning model with large context \
                          window"
                .into(),
            temperature: TemperatureConstraint::range(0.0, 2.0, 0.7),
            ..ModelCapabilities::new(ProviderKind::OpenAi, "gpt-4.1-2025-04-14")
        },
    ]
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            wire: OpenAiCompat::new(
                ProviderKind::OpenAi,
                &base,
                Some(api_key),
                AuthStyle::Bearer,
                vec![],
            ),
            base_url: base,
            table: ModelTable::new(builtin_models())
                .expect("builtin OpenAI model table is valid"),
        }
    }

    /// Chat-completions body with OpenAI-specific shaping: the output cap is
    /// spelled `max_completion_tokens`, and reasoning models receive their
    /// thinking budget as an absolute token count derived from the per-model
    /// ceiling.
    fn build_body(
        &self,
        caps: &ModelCapabilities,
        canonical: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Value {
        let mut body = build_chat_body(caps, canonical, prompt, options);
        if let Some(max) = body.as_object_mut().and_then(|o| o.remove("max_tokens")) {
            body["max_completion_tokens"] = max;
        }
        if caps.max_thinking_tokens > 0 {
            if let Some(mode) = options.thinking_mode {
                body["reasoning"] = json!({ "max_tokens": mode.budget(caps.max_thinking_tokens) });
            }
        }
        body
    }

    /// Responses-endpoint body: one composite input string, no message list.
    fn build_responses_body(
        &self,
        caps: &ModelCapabilities,
        canonical: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Value {
        let input = match &options.system_prompt {
            Some(system) if caps.supports_system_prompts => format!("{system}\n\n{prompt}"),
            _ => prompt.to_string(),
        };
        let mut body = json!({ "model": canonical, "input": input });
        if let Some(max) = options.max_output_tokens {
            body["max_output_tokens"] = json!(max);
        }
        if caps.max_thinking_tokens > 0 {
            if let Some(mode) = options.thinking_mode {
                body["reasoning"] = json!({ "max_tokens": mode.budget(caps.max_thinking_tokens) });
            }
        }
        body
    }

    async fn generate_via_responses(
        &self,
        caps: &ModelCapabilities,
        canonical: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/responses", self.base_url.trim_end_matches('/'));
        let body = self.build_responses_body(caps, canonical, prompt, options);

        let raw = with_retries(ProviderKind::OpenAi, canonical, || {
            self.wire.post(&url, &body)
        })
        .await?;

        let content = extract_responses_text(&raw).ok_or_else(|| ProviderError::BadResponse {
            provider: ProviderKind::OpenAi,
            message: "responses endpoint returned no output text".into(),
        })?;

        let usage = &raw["usage"];
        let input = usage["input_tokens"].as_u64().unwrap_or(0) as u32;
        let output = usage["output_tokens"].as_u64().unwrap_or(0) as u32;

        let mut metadata = serde_json::Map::new();
        metadata.insert("endpoint".into(), json!("responses"));
        if let Some(id) = raw["id"].as_str() {
            metadata.insert("id".into(), json!(id));
        }

        Ok(ModelResponse {
            content,
            usage: TokenUsage {
                input_tokens: input,
                output_tokens: output,
                total_tokens: input + output,
            },
            model_name: canonical.to_string(),
            friendly_name: self.friendly_name().to_string(),
            provider: ProviderKind::OpenAi,
            metadata,
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn friendly_name(&self) -> &str {
        "OpenAI"
    }

    fn table(&self) -> &ModelTable {
        &self.table
    }

    fn preferred_model(&self, category: ToolModelCategory) -> Option<String> {
        let candidates: &[&str] = match category {
            ToolModelCategory::FastResponse => &["o4-mini", "o3-mini"],
            ToolModelCategory::Balanced => &["o4-mini", "o3-mini", "o3"],
            ToolModelCategory::ExtendedReasoning => &["o3", "o3-mini"],
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

        if canonical == RESPONSES_ENDPOINT_MODEL {
            return self
                .generate_via_responses(&caps, &canonical, prompt, options)
                .await;
        }

        let body = self.build_body(&caps, &canonical, prompt, options);
        let completion = with_retries(ProviderKind::OpenAi, &canonical, || {
            self.wire.chat(&body)
        })
        .await?;

        let mut metadata = serde_json::Map::new();
        if let Some(reason) = &completion.finish_reason {
            metadata.insert("finish_reason".into(), json!(reason));
        }
        metadata.insert("model".into(), json!(completion.model));
        metadata.insert("id".into(), json!(completion.id));
        metadata.insert("created".into(), json!(completion.created));

        Ok(ModelResponse {
            content: completion.content,
            usage: completion.usage,
            model_name: canonical,
            friendly_name: self.friendly_name().to_string(),
            provider: ProviderKind::OpenAi,
            metadata,
        })
    }
}

/// Pull the text out of a responses-endpoint payload:
/// `output[].content[].text` for items of type `output_text`.
fn extract_responses_text(raw: &Value) -> Option<String> {
    let output = raw["output"].as_array()?;
    let mut text = String::new();
    for item in output {
        if let Some(content) = item["content"].as_array() {
            for part in content {
                if part["type"].as_str() == Some("output_text") {
                    if let Some(t) = part["text"].as_str() {
                        text.push_str(t);
                    }
                }
            }
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
