// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_context::{ContextAssembler, PromptSpec};
use conduit_model::ToolModelCategory;

use crate::builtin::pack_reference_examples;
use crate::prompts::REFACTOR_PROMPT;
use crate::tool::{
    base_schema, PreparedPrompt, Tool, ToolContext, ToolError, ToolRequest,
    TEMPERATURE_ANALYTICAL,
};

/// Share of the content budget spent on style-guide example files.
const STYLE_GUIDE_BUDGET_PERCENT: usize = 25;

/// Refactoring analysis: smells, decomposition, modernization, organization.
pub struct RefactorTool;

#[derive(Debug, Deserialize)]
struct RefactorFields {
    refactor_type: String,
    #[serde(default)]
    focus_areas: Option<Vec<String>>,
    #[serde(default)]
    style_guide_examples: Vec<String>,
}

const REFACTOR_TYPES: [&str; 4] = ["codesmells", "decompose", "modernize", "organization"];

impl Tool for RefactorTool {
    fn name(&self) -> &str {
        "refactor"
    }

    fn description(&self) -> &str {
        "REFACTORING ANALYSIS - find code smells, oversized units to decompose, \
         modernization opportunities, or file-organization problems in the named \
         code. Proposals come ordered by impact with risk notes."
    }

    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value {
        base_schema(
            auto_mode,
            available_models,
            json!({
                "refactor_type": {
                    "type": "string",
                    "enum": REFACTOR_TYPES,
                    "description": "Kind of refactoring analysis to perform."
                },
                "focus_areas": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Specific areas to concentrate on."
                },
                "style_guide_examples": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Files exemplifying the target style (absolute paths)."
                }
            }),
            &["files", "prompt", "refactor_type"],
        )
    }

    fn category(&self) -> ToolModelCategory {
        ToolModelCategory::Balanced
    }

    fn default_temperature(&self) -> f64 {
        TEMPERATURE_ANALYTICAL
    }

    fn system_prompt(&self) -> &str {
        REFACTOR_PROMPT
    }

    fn wants_line_numbers(&self) -> bool {
        true
    }

    fn prepare_prompt(
        &self,
        request: &ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<PreparedPrompt, ToolError> {
        if request.files.is_empty() {
            return Err(ToolError::InvalidRequest(
                "refactor requires the files to analyze".into(),
            ));
        }
        let fields: RefactorFields = request.extra()?;
        if !REFACTOR_TYPES.contains(&fields.refactor_type.as_str()) {
            return Err(ToolError::InvalidRequest(format!(
                "unknown refactor_type '{}' (expected one of: {})",
                fields.refactor_type,
                REFACTOR_TYPES.join(", ")
            )));
        }

        let (style_section, style_tokens) = pack_reference_examples(
            ctx,
            &request.files,
            &fields.style_guide_examples,
            STYLE_GUIDE_BUDGET_PERCENT,
            self.wants_line_numbers(),
        );

        let mut user_text = format!(
            "## Refactoring Request ({})\n{}\n",
            fields.refactor_type, request.prompt
        );
        if let Some(areas) = &fields.focus_areas {
            if !areas.is_empty() {
                user_text.push_str(&format!("\nFocus areas: {}\n", areas.join(", ")));
            }
        }

        let assembler = ContextAssembler::new(ctx.sandbox, ctx.conversations);
        let spec = PromptSpec {
            user_prompt: user_text.clone(),
            files: request.files.clone(),
            continuation_id: request.continuation_id.clone(),
            context_window: ctx.capabilities.context_window,
            line_numbers: self.wants_line_numbers(),
            reserve_tokens: style_tokens,
        };
        let assembled = assembler.assemble(&spec);

        let mut text = String::new();
        if !style_section.trim().is_empty() {
            text.push_str(&format!(
                "=== STYLE GUIDE EXAMPLES ===\n{style_section}\n=== END STYLE GUIDE ===\n\n"
            ));
        }
        text.push_str(&ContextAssembler::compose(&assembled, &user_text));
        if request.use_websearch {
            text.push_str(crate::builtin::websearch_instruction());
        }

        let mut files = assembled.requested_files;
        files.extend(fields.style_guide_examples);
        files.sort();
        files.dedup();

        Ok(PreparedPrompt { text, files })
    }
}
