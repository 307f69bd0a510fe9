// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared wire core for OpenAI-compatible chat completion APIs.
//!
//! Four of the six providers (OpenAI, X.AI, OpenRouter, Custom) speak the
//! same `/chat/completions` wire format, and DIAL speaks it behind
//! deployment-scoped URLs.  This module owns the HTTP mechanics — auth
//! header styles, extra headers, query parameters, timeouts, response
//! parsing — while request *shaping* lives in [`build_chat_body`], which is
//! the single place the capability flags decide what goes on the wire.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::capabilities::{ModelCapabilities, ProviderKind, TokenUsage};
use crate::error::ProviderError;
use crate::provider::GenerateOptions;

/// How the API key is attached to requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` — the common case.
    Bearer,
    /// `Api-Key: <key>` — hosted gateways that reject bearer auth.  The
    /// transport never sets an `Authorization` header in this mode.
    ApiKeyHeader,
    /// No authentication — local inference servers.
    None,
}

/// Default timeout for a full generation round-trip.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// A parsed chat-completion (or responses-endpoint) result.
#[derive(Debug, Clone)]
pub struct WireCompletion {
    pub content: String,
    pub usage: TokenUsage,
    /// Model name reported by the upstream (may differ from the request).
    pub model: String,
    pub id: String,
    pub created: i64,
    pub finish_reason: Option<String>,
}

/// HTTP client wrapper for one OpenAI-compatible endpoint.
#[derive(Debug)]
pub struct OpenAiCompat {
    provider: ProviderKind,
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    auth: AuthStyle,
    extra_headers: Vec<(String, String)>,
    default_query: Vec<(String, String)>,
}

impl OpenAiCompat {
    /// Endpoint at `base_url` + `/chat/completions`, with its own connection
    /// pool.
    pub fn new(
        provider: ProviderKind,
        base_url: &str,
        api_key: Option<String>,
        auth: AuthStyle,
        extra_headers: Vec<(String, String)>,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            provider,
            client: reqwest::Client::new(),
            url: format!("{base}/chat/completions"),
            api_key,
            auth,
            extra_headers,
            default_query: Vec::new(),
        }
    }

    /// Endpoint with a pre-built URL and a *shared* `reqwest::Client`.
    ///
    /// Used by the hosted provider, which derives one URL per deployment but
    /// reuses a single connection pool across all of them.
    pub fn with_url(
        provider: ProviderKind,
        client: reqwest::Client,
        url: impl Into<String>,
        api_key: Option<String>,
        auth: AuthStyle,
        default_query: Vec<(String, String)>,
    ) -> Self {
        Self {
            provider,
            client,
            url: url.into(),
            api_key,
            auth,
            extra_headers: Vec::new(),
            default_query,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` to the endpoint and parse a chat-completion response.
    pub async fn chat(&self, body: &Value) -> Result<WireCompletion, ProviderError> {
        let raw = self.post(&self.url, body).await?;
        parse_chat_completion(self.provider, &raw)
    }

    /// POST `body` to an arbitrary URL on this endpoint's transport.  Used
    /// for endpoint-shape variants such as the responses endpoint.
    pub async fn post(&self, url: &str, body: &Value) -> Result<Value, ProviderError> {
        let mut req = self
            .client
            .post(url)
            .timeout(GENERATE_TIMEOUT)
            .json(body);

        req = match self.auth {
            AuthStyle::Bearer => {
                let key = self.api_key.as_deref().ok_or_else(|| {
                    ProviderError::InvalidRequest(format!(
                        "{} API key is not configured",
                        self.provider
                    ))
                })?;
                req.bearer_auth(key)
            }
            AuthStyle::ApiKeyHeader => {
                let key = self.api_key.as_deref().ok_or_else(|| {
                    ProviderError::InvalidRequest(format!(
                        "{} API key is not configured",
                        self.provider
                    ))
                })?;
                req.header("Api-Key", key)
            }
            AuthStyle::None => req,
        };

        for (name, value) in &self.extra_headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !self.default_query.is_empty() {
            req = req.query(&self.default_query);
        }

        debug!(provider = %self.provider, url = %url, "sending generation request");

        let resp = req.send().await.map_err(|e| ProviderError::Transport {
            provider: self.provider,
            message: e.to_string(),
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ProviderError::Transport {
            provider: self.provider,
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: self.provider,
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::BadResponse {
            provider: self.provider,
            message: format!("invalid JSON: {e}"),
        })
    }
}

/// Build the `/chat/completions` request body from capability flags.
///
/// Temperature and its coupled parameters (`top_p`, `frequency_penalty`,
/// `presence_penalty`, `max_tokens`) are serialized only when the model
/// supports temperature; `seed` and `stop` always pass through.  Image
/// content is attached only when the model supports images.
pub fn build_chat_body(
    caps: &ModelCapabilities,
    canonical: &str,
    prompt: &str,
    options: &GenerateOptions,
) -> Value {
    let mut messages: Vec<Value> = Vec::new();
    if let Some(system) = &options.system_prompt {
        if caps.supports_system_prompts {
            messages.push(json!({ "role": "system", "content": system }));
        }
    }

    if caps.supports_images && !options.images.is_empty() {
        let mut parts = vec![json!({ "type": "text", "text": prompt })];
        for image in &options.images {
            parts.push(json!({ "type": "image_url", "image_url": { "url": image } }));
        }
        messages.push(json!({ "role": "user", "content": parts }));
    } else {
        messages.push(json!({ "role": "user", "content": prompt }));
    }

    let mut body = json!({
        "model": canonical,
        "messages": messages,
    });

    if caps.supports_temperature {
        body["temperature"] = json!(caps.temperature.clamp(options.temperature));
        if let Some(max) = options.max_output_tokens {
            body["max_tokens"] = json!(max);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(fp) = options.frequency_penalty {
            body["frequency_penalty"] = json!(fp);
        }
        if let Some(pp) = options.presence_penalty {
            body["presence_penalty"] = json!(pp);
        }
    }

    if let Some(seed) = options.seed {
        body["seed"] = json!(seed);
    }
    if let Some(stop) = &options.stop {
        body["stop"] = json!(stop);
    }

    body
}

/// Parse the standard chat-completion response shape.
pub fn parse_chat_completion(
    provider: ProviderKind,
    raw: &Value,
) -> Result<WireCompletion, ProviderError> {
    let content = raw["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::BadResponse {
            provider,
            message: "response carries no message content".into(),
        })?
        .to_string();

    Ok(WireCompletion {
        content,
        usage: parse_usage(raw),
        model: raw["model"].as_str().unwrap_or_default().to_string(),
        id: raw["id"].as_str().unwrap_or_default().to_string(),
        created: raw["created"].as_i64().unwrap_or(0),
        finish_reason: raw["choices"][0]["finish_reason"]
            .as_str()
            .map(str::to_string),
    })
}

/// Extract usage counts; absent fields count as zero.
pub fn parse_usage(raw: &Value) -> TokenUsage {
    let usage = &raw["usage"];
    let input = usage["prompt_tokens"]
        .as_u64()
        .or_else(|| usage["input_tokens"].as_u64())
        .unwrap_or(0) as u32;
    let output = usage["completion_tokens"]
        .as_u64()
        .or_else(|| usage["output_tokens"].as_u64())
        .unwrap_or(0) as u32;
    let total = usage["total_tokens"].as_u64().unwrap_or(u64::from(input + output)) as u32;
    TokenUsage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: total,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
