// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The tool driver: orchestrates one tool invocation end to end.
//!
//! Sequence per call: validate arguments → prompt-size gate → resolve the
//! model (explicit name or auto-mode category) → fetch capabilities and
//! effective temperature → build the prompt → call the provider (which owns
//! its retry loop) → attach metadata → record the turns.  Every exit path
//! returns a well-formed envelope.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use conduit_config::Config;
use conduit_context::{ConversationStore, InitialContext, MemoryStore, Sandbox, TurnRole};
use conduit_model::{
    registry, ErrorKind, GenerateOptions, ModelProvider, ProviderKind,
};

use crate::tool::{Tool, ToolOutput, ToolRequest, MAX_PROMPT_CHARS};
use crate::tool::{OutputStatus, ToolContext};

pub struct ToolDriver {
    config: Config,
    sandbox: Sandbox,
    conversations: ConversationStore,
}

impl ToolDriver {
    pub fn new(config: Config) -> Self {
        let sandbox = Sandbox::new(config.workspace_root.clone())
            .with_container_root(config.container_root.clone())
            .with_user_home(config.user_home.clone());
        let conversations = ConversationStore::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(config.conversation_ttl_hours * 60 * 60),
        );
        Self {
            config,
            sandbox,
            conversations,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Execute one tool call.  Never panics, never returns a bare error —
    /// every outcome is an envelope with `tool_name` metadata attached.
    pub async fn execute(&self, tool: &dyn Tool, args: Value) -> ToolOutput {
        let mut metadata = Map::new();
        metadata.insert("tool_name".into(), json!(tool.name()));

        let request = match ToolRequest::parse(args) {
            Ok(request) => request,
            Err(e) => return ToolOutput::error(e.kind(), e.to_string(), metadata),
        };

        // Early prompt-size gate: oversized prompts are bounced before any
        // model work so the caller can restructure instead of failing late.
        let prompt_chars = request.prompt.chars().count();
        if prompt_chars > MAX_PROMPT_CHARS {
            return ToolOutput::resend_prompt(prompt_chars, metadata);
        }

        // Model resolution: explicit name wins; otherwise auto mode asks the
        // registry for the tool's category, and a concrete DEFAULT_MODEL is
        // the final fallback.
        let model_requested = match &request.model {
            Some(name) => name.clone(),
            None if self.config.is_auto_mode() => {
                let picked = {
                    let mut reg = lock_registry();
                    reg.preferred_fallback(tool.category())
                };
                match picked {
                    Ok(name) => {
                        debug!(tool = tool.name(), model = %name, "auto mode selected model");
                        name
                    }
                    Err(e) => return ToolOutput::error(e.kind(), e.to_string(), metadata),
                }
            }
            None => self.config.default_model.clone(),
        };
        // The caller-supplied spelling (or the auto-selected name) is what
        // metadata reports, not the resolved canonical.
        metadata.insert("model_used".into(), json!(model_requested));

        let provider = {
            let mut reg = lock_registry();
            reg.provider_for_model(&model_requested)
        };
        let provider = match provider {
            Some(provider) => provider,
            None => {
                let (kind, message) = self.classify_unroutable(&model_requested);
                return ToolOutput::error(kind, message, metadata);
            }
        };
        metadata.insert("provider_used".into(), json!(provider.kind().as_str()));

        let capabilities = match provider.capabilities(&model_requested) {
            Ok(caps) => caps,
            Err(e) => return ToolOutput::error(e.kind(), e.to_string(), metadata),
        };

        let ctx = ToolContext {
            sandbox: &self.sandbox,
            conversations: &self.conversations,
            capabilities: &capabilities,
        };
        let prepared = match tool.prepare_prompt(&request, &ctx) {
            Ok(prepared) => prepared,
            Err(e) => return ToolOutput::error(e.kind(), e.to_string(), metadata),
        };

        let options = GenerateOptions {
            system_prompt: Some(tool.system_prompt().to_string()),
            temperature: request.temperature.unwrap_or_else(|| tool.default_temperature()),
            thinking_mode: request.thinking_mode,
            ..GenerateOptions::default()
        };

        info!(
            tool = tool.name(),
            model = %model_requested,
            provider = %provider.kind(),
            prompt_tokens = prepared.text.len() / 4,
            "dispatching generation"
        );

        let response = match provider
            .generate(&prepared.text, &model_requested, &options)
            .await
        {
            Ok(response) => response,
            Err(e) => return ToolOutput::error(e.kind(), e.to_string(), metadata),
        };

        metadata.insert(
            "usage".into(),
            json!({
                "input_tokens": response.usage.input_tokens,
                "output_tokens": response.usage.output_tokens,
                "total_tokens": response.usage.total_tokens,
            }),
        );

        let content = tool.format_response(&response.content, &request);

        // A model may answer with a structured clarification request instead
        // of an analysis; pass that status through to the caller.
        if is_clarification_request(&content) {
            let mut out = ToolOutput::success(content, metadata);
            out.status = OutputStatus::RequiresClarification;
            return out;
        }

        if tool.supports_continuation() {
            let thread_id = self.record_turns(
                tool,
                &request,
                &prepared.files,
                &content,
                &model_requested,
                &provider,
            );
            if let Some(id) = thread_id {
                metadata.insert("continuation_id".into(), json!(id));
                let mut out = ToolOutput::success(content, metadata);
                out.status = OutputStatus::ContinuationAvailable;
                return out;
            }
        }

        ToolOutput::success(content, metadata)
    }

    /// Append the user-request and assistant turns, creating the thread on
    /// first use.  Returns the thread id, or `None` when persisting failed.
    fn record_turns(
        &self,
        tool: &dyn Tool,
        request: &ToolRequest,
        files: &[String],
        content: &str,
        model: &str,
        provider: &Arc<dyn ModelProvider>,
    ) -> Option<String> {
        let thread_id = match &request.continuation_id {
            Some(id) if self.conversations.get_thread(id).is_some() => id.clone(),
            _ => self.conversations.create_thread(
                tool.name(),
                InitialContext {
                    files: request.files.clone(),
                    prompt: request.prompt.clone(),
                    extra: serde_json::Map::new(),
                },
            ),
        };

        let kind = provider.kind().as_str();
        self.conversations
            .add_turn(
                &thread_id,
                TurnRole::User,
                &request.prompt,
                files,
                tool.name(),
                model,
                kind,
            )
            .ok()?;
        self.conversations
            .add_turn(&thread_id, TurnRole::Assistant, content, &[], tool.name(), model, kind)
            .ok()?;
        Some(thread_id)
    }

    /// No provider claimed the model: decide whether it exists but is
    /// policy-denied, or is simply unknown.
    fn classify_unroutable(&self, model: &str) -> (ErrorKind, String) {
        let mut reg = lock_registry();
        for kind in ProviderKind::priority_order() {
            if let Some(provider) = reg.provider(kind) {
                if provider.table().contains(model) {
                    return (
                        ErrorKind::PolicyDenied,
                        format!(
                            "model '{model}' exists on the {kind} provider but is denied by \
                             its restriction policy"
                        ),
                    );
                }
            }
        }
        let available: Vec<String> = reg.available_models(true).into_keys().collect();
        (
            ErrorKind::NoModelAvailable,
            format!(
                "no configured provider supports model '{model}'; available models: {}",
                if available.is_empty() {
                    "none (no provider credentials configured)".to_string()
                } else {
                    available.join(", ")
                }
            ),
        )
    }
}

fn lock_registry() -> std::sync::MutexGuard<'static, conduit_model::ProviderRegistry> {
    registry::global()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Detect a structured clarification request in the model output.
fn is_clarification_request(content: &str) -> bool {
    let trimmed = content.trim();
    if !trimmed.starts_with('{') {
        return false;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value["status"].as_str() == Some("requires_clarification"),
        Err(_) => false,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
