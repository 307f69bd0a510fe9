// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Google Gemini driver — native Generative Language API.
//!
//! # Auth
//! API key via the `x-goog-api-key` header.
//!
//! # Endpoint pattern
//! `POST https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent`

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::capabilities::{
    ModelCapabilities, ModelResponse, ProviderKind, TemperatureConstraint,
};
use crate::error::ProviderError;
use crate::openai_compat::parse_usage;
use crate::provider::{first_allowed, GenerateOptions, ModelProvider, ModelTable};
use crate::retry::with_retries;
use crate::selection::ToolModelCategory;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GoogleProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    table: ModelTable,
}

fn builtin_models() -> Vec<ModelCapabilities> {
    vec![
        ModelCapabilities {
            friendly_name: "Gemini (Pro 2.5)".into(),
            aliases: vec!["pro".into(), "gemini-pro".into()],
            context_window: 1_048_576,
            max_output_tokens: 65_536,
            supports_extended_thinking: true,
            supports_function_calling: true,
            max_thinking_tokens: 32_768,
            description: "Deep reasoning + thinking mode (1M context) - Complex problems, \
                          architecture, deep analysis"
                .into(),
            temperature: TemperatureConstraint::range(0.0, 2.0, 0.7),
            ..ModelCapabilities::new(ProviderKind::Google, "gemini-2.5-pro-preview-06-05")
        },
        ModelCapabilities {
            friendly_name: "Gemini (Flash 2.5)".into(),
            aliases: vec!["flash".into(), "gemini-flash".into()],
            context_window: 1_048_576,
            max_output_tokens: 65_536,
            supports_extended_thinking: true,
            supports_function_calling: true,
            max_thinking_tokens: 24_576,
            description: "Ultra-fast (1M context) - Quick analysis, simple queries, rapid \
                          iterations"
                .into(),
            temperature: TemperatureConstraint::range(0.0, 2.0, 0.7),
            ..ModelCapabilities::new(ProviderKind::Google, "gemini-2.5-flash-preview-05-20")
        },
    ]
}

impl GoogleProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: reqwest::Client::new(),
            table: ModelTable::new(builtin_models())
                .expect("builtin Gemini model table is valid"),
        }
    }

    fn build_body(&self, caps: &ModelCapabilities, prompt: &str, options: &GenerateOptions) -> Value {
        // Gemini has no separate system role in this endpoint shape; the
        // system prompt is folded into the user text.
        let full_prompt = match &options.system_prompt {
            Some(system) => format!("{system}\n\n{prompt}"),
            None => prompt.to_string(),
        };

        let mut generation_config = json!({ "candidateCount": 1 });
        if caps.supports_temperature {
            generation_config["temperature"] =
                json!(caps.temperature.clamp(options.temperature));
            if let Some(max) = options.max_output_tokens {
                generation_config["maxOutputTokens"] = json!(max);
            }
        }
        if caps.supports_extended_thinking && caps.max_thinking_tokens > 0 {
            if let Some(mode) = options.thinking_mode {
                generation_config["thinkingConfig"] =
                    json!({ "thinkingBudget": mode.budget(caps.max_thinking_tokens) });
            }
        }

        json!({
            "contents": [ { "role": "user", "parts": [ { "text": full_prompt } ] } ],
            "generationConfig": generation_config,
        })
    }

    async fn call(&self, canonical: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            canonical
        );
        let resp = self
            .client
            .post(&url)
            .timeout(GENERATE_TIMEOUT)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: ProviderKind::Google,
                message: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ProviderError::Transport {
            provider: ProviderKind::Google,
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: ProviderKind::Google,
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::BadResponse {
            provider: ProviderKind::Google,
            message: format!("invalid JSON: {e}"),
        })
    }
}

#[async_trait]
impl ModelProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn friendly_name(&self) -> &str {
        "Gemini"
    }

    fn table(&self) -> &ModelTable {
        &self.table
    }

    fn preferred_model(&self, category: ToolModelCategory) -> Option<String> {
        let candidates: &[&str] = match category {
            ToolModelCategory::FastResponse => &["flash"],
            ToolModelCategory::Balanced => &["flash", "pro"],
            ToolModelCategory::ExtendedReasoning => &["pro", "flash"],
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
        let body = self.build_body(&caps, prompt, options);

        let raw = with_retries(ProviderKind::Google, &canonical, || {
            self.call(&canonical, &body)
        })
        .await?;

        let content = extract_text(&raw).ok_or_else(|| ProviderError::BadResponse {
            provider: ProviderKind::Google,
            message: "response carries no candidate text".into(),
        })?;

        let mut metadata = serde_json::Map::new();
        if let Some(reason) = raw["candidates"][0]["finishReason"].as_str() {
            metadata.insert("finish_reason".into(), json!(reason));
        }
        if let Some(mode) = options.thinking_mode {
            if caps.supports_extended_thinking {
                metadata.insert("thinking_mode".into(), json!(format!("{mode:?}").to_lowercase()));
            }
        }

        Ok(ModelResponse {
            content,
            usage: extract_usage(&raw),
            model_name: canonical,
            friendly_name: self.friendly_name().to_string(),
            provider: ProviderKind::Google,
            metadata,
        })
    }
}

fn extract_text(raw: &Value) -> Option<String> {
    let parts = raw["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_usage(raw: &Value) -> crate::capabilities::TokenUsage {
    let metadata = &raw["usageMetadata"];
    if metadata.is_object() {
        let input = metadata["promptTokenCount"].as_u64().unwrap_or(0) as u32;
        let output = metadata["candidatesTokenCount"].as_u64().unwrap_or(0) as u32;
        crate::capabilities::TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    } else {
        parse_usage(raw)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ThinkingMode;

    fn provider() -> GoogleProvider {
        GoogleProvider::new("test-key".into(), None)
    }

    #[test]
    fn flash_and_pro_aliases_resolve() {
        let p = provider();
        assert_eq!(p.resolve_model_name("flash"), "gemini-2.5-flash-preview-05-20");
        assert_eq!(p.resolve_model_name("pro"), "gemini-2.5-pro-preview-06-05");
    }

    #[test]
    fn both_models_support_thinking() {
        let p = provider();
        assert!(p.supports_thinking("flash"));
        assert!(p.supports_thinking("pro"));
    }

    #[test]
    fn thinking_budget_lands_in_generation_config() {
        let p = provider();
        let caps = p.capabilities("pro").unwrap();
        let mut opts = GenerateOptions::default();
        opts.thinking_mode = Some(ThinkingMode::Medium);
        let body = p.build_body(&caps, "question", &opts);
        let budget = body["generationConfig"]["thinkingConfig"]["thinkingBudget"]
            .as_u64()
            .unwrap();
        assert_eq!(budget, u64::from(ThinkingMode::Medium.budget(32_768)));
    }

    #[test]
    fn system_prompt_is_folded_into_user_text() {
        let p = provider();
        let caps = p.capabilities("flash").unwrap();
        let mut opts = GenerateOptions::default();
        opts.system_prompt = Some("be terse".into());
        let body = p.build_body(&caps, "question", &opts);
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("be terse"));
        assert!(text.ends_with("question"));
    }

    #[test]
    fn extract_text_concatenates_parts() {
        let raw = json!({
            "candidates": [ { "content": { "parts": [ {"text": "a"}, {"text": "b"} ] } } ]
        });
        assert_eq!(extract_text(&raw).unwrap(), "ab");
    }

    #[test]
    fn extract_usage_sums_prompt_and_candidates() {
        let raw = json!({ "usageMetadata": { "promptTokenCount": 7, "candidatesTokenCount": 3 } });
        let usage = extract_usage(&raw);
        assert_eq!(usage.total_tokens, 10);
    }

    #[test]
    fn preferred_fast_model_is_flash() {
        crate::restrictions::reset();
        let p = provider();
        assert_eq!(
            p.preferred_model(ToolModelCategory::FastResponse).unwrap(),
            "gemini-2.5-flash-preview-05-20"
        );
    }

    #[test]
    fn preferred_reasoning_model_is_pro() {
        crate::restrictions::reset();
        let p = provider();
        assert_eq!(
            p.preferred_model(ToolModelCategory::ExtendedReasoning).unwrap(),
            "gemini-2.5-pro-preview-06-05"
        );
    }
}
