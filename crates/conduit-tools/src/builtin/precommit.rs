// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Pre-commit validation of pending source-control changes.
//!
//! Discovers every git repository under the given path, extracts diffs for
//! the requested mode (compare-ref, staged, unstaged), packs them under a
//! token budget of roughly `context_window − 50k`, and spends whatever
//! remains on caller-named context files.  Diffs stay raw; context files
//! may carry line numbers.

use serde::Deserialize;
use serde_json::{json, Value};

use conduit_context::{ContextAssembler, PromptSpec};
use conduit_model::ToolModelCategory;
use conduit_vcs::{collect_diffs, find_repositories, DiffRequest, DEFAULT_MAX_DEPTH,
    DIFF_BUDGET_RESERVE};

use crate::prompts::PRECOMMIT_PROMPT;
use crate::tool::{
    base_schema, PreparedPrompt, Tool, ToolContext, ToolError, ToolRequest,
    TEMPERATURE_ANALYTICAL,
};

pub struct PrecommitTool;

#[derive(Debug, Deserialize)]
struct PrecommitFields {
    path: String,
    #[serde(default)]
    original_request: Option<String>,
    #[serde(default)]
    compare_to: Option<String>,
    #[serde(default = "default_true")]
    include_staged: bool,
    #[serde(default = "default_true")]
    include_unstaged: bool,
    #[serde(default)]
    focus_on: Option<String>,
    #[serde(default = "default_review_type")]
    review_type: String,
    #[serde(default = "default_severity")]
    severity_filter: String,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
}

fn default_true() -> bool {
    true
}

fn default_review_type() -> String {
    "full".into()
}

fn default_severity() -> String {
    "all".into()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Tool for PrecommitTool {
    fn name(&self) -> &str {
        "precommit"
    }

    fn description(&self) -> &str {
        "PRECOMMIT VALIDATION FOR GIT CHANGES - use before creating any commit. \
         Searches git repositories recursively under the given path and reviews \
         staged/unstaged changes (or a comparison against a ref) for bugs, security \
         issues, and incomplete implementations."
    }

    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value {
        base_schema(
            auto_mode,
            available_models,
            json!({
                "path": {
                    "type": "string",
                    "description": "Starting directory to search for git repositories \
                                    (must be an absolute path)."
                },
                "original_request": {
                    "type": "string",
                    "description": "The user request or ticket the changes implement; \
                                    critical context for the review."
                },
                "compare_to": {
                    "type": "string",
                    "description": "Git ref (branch, tag, commit) to compare against \
                                    instead of local staged/unstaged changes."
                },
                "include_staged": {
                    "type": "boolean",
                    "default": true,
                    "description": "Review staged changes (ignored with compare_to)."
                },
                "include_unstaged": {
                    "type": "boolean",
                    "default": true,
                    "description": "Review unstaged changes (ignored with compare_to)."
                },
                "focus_on": {
                    "type": "string",
                    "description": "Specific aspects to focus on."
                },
                "review_type": {
                    "type": "string",
                    "enum": ["full", "security", "performance", "quick"],
                    "default": "full"
                },
                "severity_filter": {
                    "type": "string",
                    "enum": ["critical", "high", "medium", "all"],
                    "default": "all"
                },
                "max_depth": {
                    "type": "integer",
                    "default": DEFAULT_MAX_DEPTH,
                    "description": "Maximum depth when searching for nested repositories."
                }
            }),
            &["path"],
        )
    }

    fn category(&self) -> ToolModelCategory {
        ToolModelCategory::ExtendedReasoning
    }

    fn default_temperature(&self) -> f64 {
        TEMPERATURE_ANALYTICAL
    }

    fn system_prompt(&self) -> &str {
        PRECOMMIT_PROMPT
    }

    fn wants_line_numbers(&self) -> bool {
        // Context files only; diff bodies are never numbered.
        true
    }

    fn prepare_prompt(
        &self,
        request: &ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<PreparedPrompt, ToolError> {
        let fields: PrecommitFields = request.extra()?;

        // Sandbox-validate the search root; relative paths and escapes fail
        // here with the path named in the error.
        let root = ctx.sandbox.resolve(&fields.path)?;

        let repositories = find_repositories(&root, fields.max_depth);
        if repositories.is_empty() {
            return Ok(PreparedPrompt {
                text: "No git repositories found in the specified path.".into(),
                files: Vec::new(),
            });
        }

        let diff_request = DiffRequest {
            compare_to: fields.compare_to.clone(),
            include_staged: fields.include_staged,
            include_unstaged: fields.include_unstaged,
        };
        let window = ctx.capabilities.context_window as usize;
        let diff_budget = window.saturating_sub(DIFF_BUDGET_RESERVE).max(1_000);
        let collection = collect_diffs(&repositories, &diff_request, diff_budget);

        if collection.is_empty() && collection.summaries.iter().all(|s| s.error.is_none()) {
            return Ok(PreparedPrompt {
                text: "No pending changes found in any of the git repositories.".into(),
                files: Vec::new(),
            });
        }

        // Context files spend whatever the diffs left over.
        let remaining = diff_budget.saturating_sub(collection.tokens_used);
        let content_budget = ContextAssembler::content_budget(ctx.capabilities.context_window);
        let assembler = ContextAssembler::new(ctx.sandbox, ctx.conversations);
        let spec = PromptSpec {
            user_prompt: String::new(),
            files: request.files.clone(),
            continuation_id: request.continuation_id.clone(),
            context_window: ctx.capabilities.context_window,
            line_numbers: self.wants_line_numbers(),
            reserve_tokens: content_budget.saturating_sub(remaining),
        };
        let assembled = assembler.assemble(&spec);

        // ── Prompt layout ─────────────────────────────────────────────────
        let mut parts: Vec<String> = Vec::new();

        let original_request = fields
            .original_request
            .clone()
            .or_else(|| {
                if request.prompt.trim().is_empty() {
                    None
                } else {
                    Some(request.prompt.clone())
                }
            });
        if let Some(original) = original_request {
            parts.push(format!("## Original Request\n\n{original}\n"));
        }

        let mut params = String::from("## Review Parameters\n");
        params.push_str(&format!("- Review Type: {}\n", fields.review_type));
        params.push_str(&format!("- Severity Filter: {}\n", fields.severity_filter));
        if let Some(focus) = &fields.focus_on {
            params.push_str(&format!("- Focus Areas: {focus}\n"));
        }
        if let Some(reference) = &fields.compare_to {
            params.push_str(&format!("- Comparing Against: {reference}\n"));
        } else {
            let mut scope: Vec<&str> = Vec::new();
            if fields.include_staged {
                scope.push("staged");
            }
            if fields.include_unstaged {
                scope.push("unstaged");
            }
            params.push_str(&format!("- Reviewing: {} changes\n", scope.join(" and ")));
        }
        parts.push(params);

        let mut summary = String::from("## Repository Changes Summary\n");
        summary.push_str(&format!(
            "Found {} repositories with changes:\n",
            collection.summaries.len()
        ));
        for (idx, repo) in collection.summaries.iter().enumerate() {
            summary.push_str(&format!(
                "\n### Repository {}: {}\n",
                idx + 1,
                repo.path.display()
            ));
            if let Some(error) = &repo.error {
                summary.push_str(&format!("Error: {error}\n"));
                continue;
            }
            summary.push_str(&format!("- Branch: {}\n", repo.branch));
            if repo.ahead > 0 || repo.behind > 0 {
                summary.push_str(&format!("- Ahead: {}, Behind: {}\n", repo.ahead, repo.behind));
            }
            summary.push_str(&format!("- Changed Files: {}\n", repo.changed_files));
            for file in &repo.files {
                summary.push_str(&format!("  - {file}\n"));
            }
            if repo.changed_files > repo.files.len() {
                summary.push_str(&format!(
                    "  ... and {} more files\n",
                    repo.changed_files - repo.files.len()
                ));
            }
        }
        if collection.files_omitted > 0 {
            summary.push_str(&format!(
                "\n{} diff(s) omitted to fit the token budget.\n",
                collection.files_omitted
            ));
        }
        parts.push(summary);

        if let Some(conversation) = &assembled.conversation_section {
            parts.push(conversation.clone());
        }

        let mut diffs = String::from("## Git Diffs\n");
        if collection.diffs.is_empty() {
            diffs.push_str("--- NO DIFFS FOUND ---\n");
        } else {
            for diff in &collection.diffs {
                diffs.push_str(diff);
            }
        }
        parts.push(diffs);

        if !assembled.files_section.trim().is_empty() {
            parts.push(format!(
                "## Additional Context Files\nThe following files are provided for context; \
                 they have NOT been modified.\n{}",
                assembled.files_section
            ));
        }

        parts.push(
            "## Review Instructions\nReview these changes per the system prompt. Pay special \
             attention to alignment with the original request, completeness, bugs, security \
             issues, and uncovered edge cases."
                .to_string(),
        );

        let mut text = parts.join("\n");
        if request.use_websearch {
            text.push_str(crate::builtin::websearch_instruction());
        }

        Ok(PreparedPrompt {
            text,
            files: assembled.requested_files,
        })
    }

    fn format_response(&self, response: &str, _request: &ToolRequest) -> String {
        format!(
            "{response}\n\n---\n\n**Commit Status:** if no critical issues were found the \
             changes are ready to commit; otherwise address the issues and re-run the review. \
             Check with the user before committing."
        )
    }
}
