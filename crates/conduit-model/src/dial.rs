// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! DIAL driver — a hosted gateway with Azure-style deployment endpoints.
//!
//! DIAL authenticates with an `Api-Key` header rather than bearer auth, and
//! routes each model through its own URL:
//! `{host}/openai/deployments/{deployment}/chat/completions?api-version=…`.
//!
//! Per-deployment endpoint wrappers are cached behind a lock with a
//! double-checked read so a hot deployment never rebuilds its wrapper, and
//! every wrapper shares one `reqwest::Client` (one connection pool).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::capabilities::{
    ModelCapabilities, ModelResponse, ProviderKind, TemperatureConstraint,
};
use crate::error::ProviderError;
use crate::openai_compat::{build_chat_body, AuthStyle, OpenAiCompat};
use crate::provider::{GenerateOptions, ModelProvider, ModelTable};
use crate::retry::with_retries;

const DEFAULT_HOST: &str = "https://core.dialx.ai";
const DEFAULT_API_VERSION: &str = "2024-12-01-preview";

pub struct DialProvider {
    api_key: String,
    host: String,
    api_version: String,
    /// Shared transport; each deployment wrapper clones this client so they
    /// all draw from one connection pool.
    client: reqwest::Client,
    deployments: RwLock<HashMap<String, Arc<OpenAiCompat>>>,
    table: ModelTable,
}

fn dial_model(
    name: &str,
    context_window: u32,
    thinking: bool,
    aliases: &[&str],
) -> ModelCapabilities {
    ModelCapabilities {
        friendly_name: "DIAL".into(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        context_window,
        max_output_tokens: 32_768,
        supports_extended_thinking: thinking,
        supports_function_calling: true,
        supports_images: true,
        max_image_size_mb: 20.0,
        temperature: TemperatureConstraint::range(0.0, 2.0, 0.7),
        ..ModelCapabilities::new(ProviderKind::Dial, name)
    }
}

fn builtin_models() -> Vec<ModelCapabilities> {
    vec![
        dial_model("o3-2025-04-16", 200_000, false, &["o3"]),
        dial_model("o4-mini-2025-04-16", 200_000, false, &["o4-mini"]),
        dial_model(
            "anthropic.claude-sonnet-4-20250514-v1:0",
            200_000,
            false,
            &["sonnet-4"],
        ),
        dial_model(
            "anthropic.claude-sonnet-4-20250514-v1:0-with-thinking",
            200_000,
            true,
            &["sonnet-4-thinking"],
        ),
        dial_model(
            "anthropic.claude-opus-4-20250514-v1:0",
            200_000,
            false,
            &["opus-4"],
        ),
        dial_model(
            "anthropic.claude-opus-4-20250514-v1:0-with-thinking",
            200_000,
            true,
            &["opus-4-thinking"],
        ),
        dial_model(
            "gemini-2.5-pro-preview-03-25-google-search",
            1_000_000,
            false,
            &["gemini-2.5-pro-search"],
        ),
        dial_model(
            "gemini-2.5-pro-preview-05-06",
            1_000_000,
            false,
            &["gemini-2.5-pro"],
        ),
        dial_model(
            "gemini-2.5-flash-preview-05-20",
            1_000_000,
            false,
            &["gemini-2.5-flash"],
        ),
    ]
}

impl DialProvider {
    pub fn new(api_key: String, host: Option<String>, api_version: Option<String>) -> Self {
        let host = host
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
            .trim_end_matches('/')
            .trim_end_matches("/openai")
            .to_string();
        let api_version = api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        info!(host = %host, api_version = %api_version, "DIAL provider initialised");
        Self {
            api_key,
            host,
            api_version,
            client: reqwest::Client::new(),
            deployments: RwLock::new(HashMap::new()),
            table: ModelTable::new(builtin_models()).expect("builtin DIAL model table is valid"),
        }
    }

    /// Cached endpoint wrapper for one deployment.
    ///
    /// Fast path: shared read lock.  Slow path: write lock with a second
    /// existence check, since another caller may have built the wrapper
    /// between our read and write.
    fn deployment_endpoint(&self, deployment: &str) -> Arc<OpenAiCompat> {
        if let Ok(map) = self.deployments.read() {
            if let Some(endpoint) = map.get(deployment) {
                return Arc::clone(endpoint);
            }
        }

        let mut map = match self.deployments.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(endpoint) = map.get(deployment) {
            return Arc::clone(endpoint);
        }

        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.host, deployment
        );
        let endpoint = Arc::new(OpenAiCompat::with_url(
            ProviderKind::Dial,
            self.client.clone(),
            url,
            Some(self.api_key.clone()),
            AuthStyle::ApiKeyHeader,
            vec![("api-version".into(), self.api_version.clone())],
        ));
        map.insert(deployment.to_string(), Arc::clone(&endpoint));
        endpoint
    }

    #[cfg(test)]
    fn cached_deployment_count(&self) -> usize {
        self.deployments.read().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelProvider for DialProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dial
    }

    fn friendly_name(&self) -> &str {
        "DIAL"
    }

    fn table(&self) -> &ModelTable {
        &self.table
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
        let endpoint = self.deployment_endpoint(&canonical);

        let completion =
            with_retries(ProviderKind::Dial, &canonical, || endpoint.chat(&body)).await?;

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
            provider: ProviderKind::Dial,
            metadata,
        })
    }

    fn close(&self) {
        if let Ok(mut map) = self.deployments.write() {
            map.clear();
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
