// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Mock provider for tests: no network, records every outbound request body
//! so tests can assert on exactly what would have hit the wire.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::capabilities::{ModelCapabilities, ModelResponse, ProviderKind, TokenUsage};
use crate::error::ProviderError;
use crate::openai_compat::build_chat_body;
use crate::provider::{GenerateOptions, ModelProvider, ModelTable};

/// A recorded generation call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub body: Value,
}

pub struct MockProvider {
    kind: ProviderKind,
    friendly: String,
    table: ModelTable,
    /// Bodies that would have been serialized to the wire.
    pub calls: Mutex<Vec<RecordedCall>>,
    /// Scripted results, consumed front-to-back; when empty the mock echoes
    /// the prompt.
    scripted: Mutex<VecDeque<Result<String, ProviderError>>>,
}

impl MockProvider {
    pub fn new(kind: ProviderKind, models: Vec<ModelCapabilities>) -> Self {
        Self {
            kind,
            friendly: format!("Mock ({kind})"),
            table: ModelTable::new(models).expect("mock model table is valid"),
            calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a scripted response (or error) for the next call.
    pub fn script(&self, result: Result<String, ProviderError>) {
        if let Ok(mut q) = self.scripted.lock() {
            q.push_back(result);
        }
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn friendly_name(&self) -> &str {
        &self.friendly
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

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model: canonical.clone(),
                body,
            });
        }

        let scripted = self.scripted.lock().ok().and_then(|mut q| q.pop_front());
        let content = match scripted {
            Some(Ok(content)) => content,
            Some(Err(err)) => return Err(err),
            None => format!("echo: {prompt}"),
        };

        let output_tokens = (content.len() / 4) as u32;
        let input_tokens = (prompt.len() / 4) as u32;
        Ok(ModelResponse {
            content,
            usage: TokenUsage {
                input_tokens,
                output_tokens,
                total_tokens: input_tokens + output_tokens,
            },
            model_name: canonical,
            friendly_name: self.friendly.clone(),
            provider: self.kind,
            metadata: serde_json::Map::new(),
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
