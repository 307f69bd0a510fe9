// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Context assembly: turning a tool request plus conversation history into
//! the prompt text handed to a provider.
//!
//! The assembler owns two responsibilities that must stay consistent across
//! every tool: *deduplication* (a file embedded in a prior turn of the same
//! thread is never read or embedded again) and *budgeting* (file and
//! conversation content together spend at most 75 % of the model's context
//! window, leaving the rest for the reply and framing).

use std::collections::BTreeSet;

use crate::files::{read_files_to_budget, PackResult};
use crate::sandbox::Sandbox;
use crate::threads::{ConversationStore, Thread, TurnRole};
use crate::tokens::estimate_tokens;

/// Share of the context window spent on content (files + conversation).
const CONTENT_BUDGET_NUMERATOR: usize = 3;
const CONTENT_BUDGET_DENOMINATOR: usize = 4;

/// Cap on the text quoted per prior turn in the conversation section.
const TURN_BRIEF_CHARS: usize = 1_000;

/// Inputs to one assembly pass.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub user_prompt: String,
    /// Requested files/directories (absolute paths).
    pub files: Vec<String>,
    pub continuation_id: Option<String>,
    pub context_window: u32,
    pub line_numbers: bool,
    /// Tokens reserved inside the content budget for tool-specific sections
    /// (e.g. diffs) that the tool appends itself.
    pub reserve_tokens: usize,
}

impl PromptSpec {
    pub fn new(user_prompt: impl Into<String>, context_window: u32) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            files: Vec::new(),
            continuation_id: None,
            context_window,
            line_numbers: false,
            reserve_tokens: 0,
        }
    }
}

/// Output of one assembly pass.
#[derive(Debug, Default)]
pub struct AssembledContext {
    /// Compact history of prior turns, present only when resuming a thread.
    pub conversation_section: Option<String>,
    /// Packed file sections (may be empty).
    pub files_section: String,
    pub files_summary: String,
    /// Files actually embedded this turn (absolute, resolved).
    pub embedded_files: Vec<String>,
    /// All requested files after normalization — these are recorded on the
    /// new turn even when deduplication skipped embedding them.
    pub requested_files: Vec<String>,
    pub tokens_used: usize,
    pub content_budget: usize,
}

pub struct ContextAssembler<'a> {
    sandbox: &'a Sandbox,
    conversations: &'a ConversationStore,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(sandbox: &'a Sandbox, conversations: &'a ConversationStore) -> Self {
        Self {
            sandbox,
            conversations,
        }
    }

    /// Content budget for a model: 75 % of its context window.
    pub fn content_budget(context_window: u32) -> usize {
        (context_window as usize) * CONTENT_BUDGET_NUMERATOR / CONTENT_BUDGET_DENOMINATOR
    }

    pub fn assemble(&self, spec: &PromptSpec) -> AssembledContext {
        let mut out = AssembledContext {
            content_budget: Self::content_budget(spec.context_window),
            ..AssembledContext::default()
        };

        // Normalize the request's file list once; duplicates collapse here
        // so a file supplied in two slots of the same request embeds once.
        let mut requested: Vec<String> = Vec::new();
        let mut seen = BTreeSet::new();
        for file in &spec.files {
            let normalized = match self.sandbox.resolve(file) {
                Ok(p) => p.to_string_lossy().to_string(),
                Err(_) => file.clone(),
            };
            if seen.insert(normalized.clone()) {
                requested.push(normalized);
            }
        }
        out.requested_files = requested.clone();

        // Prior-thread state: the conversation section and the set of files
        // the model has already seen in this thread.
        let mut already_embedded = BTreeSet::new();
        let mut remaining_budget = out.content_budget;
        if let Some(id) = &spec.continuation_id {
            if let Some(thread) = self.conversations.get_thread(id) {
                already_embedded = self.conversations.files_already_embedded(id);
                let section = render_conversation_section(&thread);
                let section_tokens = estimate_tokens(&section);
                remaining_budget = remaining_budget.saturating_sub(section_tokens);
                out.tokens_used += section_tokens;
                out.conversation_section = Some(section);
            }
        }

        // Deduplicate against the thread, then pack what is genuinely new.
        let new_files: Vec<String> = requested
            .into_iter()
            .filter(|f| !already_embedded.contains(f))
            .collect();

        if !new_files.is_empty() {
            let PackResult {
                content,
                summary,
                files_read,
                ..
            } = read_files_to_budget(
                self.sandbox,
                &new_files,
                remaining_budget,
                spec.reserve_tokens,
                spec.line_numbers,
            );
            out.tokens_used += estimate_tokens(&content);
            out.files_section = content;
            out.files_summary = summary;
            out.embedded_files = files_read
                .into_iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
        }

        out
    }

    /// Compose the final prompt text: conversation context, file context,
    /// then the user request.  The tool's system prompt travels separately
    /// as the provider's system message.
    pub fn compose(assembled: &AssembledContext, user_prompt: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(conversation) = &assembled.conversation_section {
            parts.push(conversation.clone());
        }
        if !assembled.files_section.trim().is_empty() {
            parts.push(format!(
                "=== CONTEXT FILES ===\n{}\n=== END CONTEXT FILES ===",
                assembled.files_section
            ));
        }
        parts.push(format!(
            "=== USER REQUEST ===\n{user_prompt}\n=== END REQUEST ==="
        ));
        parts.join("\n\n")
    }
}

/// Compact rendering of prior turns: role, tool, model, and a bounded slice
/// of each turn's text.
fn render_conversation_section(thread: &Thread) -> String {
    let mut out = String::from("=== CONVERSATION CONTEXT (CONTINUATION) ===\n");
    out.push_str(&format!(
        "Thread: {} (opened by {}, {} prior turn(s))\n",
        thread.id,
        thread.tool_name,
        thread.turns.len()
    ));
    for (idx, turn) in thread.turns.iter().enumerate() {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };
        let mut header = format!("\n--- Turn {} ({role} via {})", idx + 1, turn.tool_name);
        if !turn.model_name.is_empty() {
            header.push_str(&format!(", model: {}", turn.model_name));
        }
        if !turn.provider.is_empty() {
            header.push_str(&format!(", provider: {}", turn.provider));
        }
        header.push_str(" ---\n");
        out.push_str(&header);
        out.push_str(&brief(&turn.content));
        out.push('\n');
    }
    out.push_str("=== END CONVERSATION CONTEXT ===");
    out
}

fn brief(text: &str) -> String {
    if text.chars().count() <= TURN_BRIEF_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(TURN_BRIEF_CHARS).collect();
    format!("{cut}…")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
