// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_model::ToolModelCategory;

use crate::builtin::assemble_standard;
use crate::prompts::THINKDEEP_PROMPT;
use crate::tool::{
    base_schema, PreparedPrompt, Tool, ToolContext, ToolError, ToolRequest, TEMPERATURE_CREATIVE,
};

/// Extended reasoning over an existing analysis.
pub struct ThinkDeepTool;

#[derive(Debug, Deserialize)]
struct ThinkDeepFields {
    #[serde(default)]
    problem_context: Option<String>,
    #[serde(default)]
    focus_areas: Option<Vec<String>>,
}

impl Tool for ThinkDeepTool {
    fn name(&self) -> &str {
        "thinkdeep"
    }

    fn description(&self) -> &str {
        "EXTENDED THINKING & REASONING - deepen an analysis you have already started: \
         challenge assumptions, surface alternatives and edge cases, weigh trade-offs. \
         Pass your current thinking as the prompt."
    }

    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value {
        base_schema(
            auto_mode,
            available_models,
            json!({
                "problem_context": {
                    "type": "string",
                    "description": "Background on the problem the analysis addresses."
                },
                "focus_areas": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Aspects to concentrate on (architecture, performance, …)."
                }
            }),
            &["prompt"],
        )
    }

    fn category(&self) -> ToolModelCategory {
        ToolModelCategory::ExtendedReasoning
    }

    fn default_temperature(&self) -> f64 {
        TEMPERATURE_CREATIVE
    }

    fn system_prompt(&self) -> &str {
        THINKDEEP_PROMPT
    }

    fn prepare_prompt(
        &self,
        request: &ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<PreparedPrompt, ToolError> {
        if request.prompt.trim().is_empty() {
            return Err(ToolError::InvalidRequest(
                "prompt must carry the current analysis to deepen".into(),
            ));
        }
        let fields: ThinkDeepFields = request.extra()?;

        let mut user_text = String::new();
        if let Some(context) = &fields.problem_context {
            user_text.push_str(&format!("=== PROBLEM CONTEXT ===\n{context}\n\n"));
        }
        user_text.push_str(&format!(
            "=== CURRENT ANALYSIS ===\n{}\n=== END ANALYSIS ===",
            request.prompt
        ));
        if let Some(areas) = &fields.focus_areas {
            if !areas.is_empty() {
                user_text.push_str(&format!("\n\nFocus especially on: {}", areas.join(", ")));
            }
        }

        assemble_standard(request, ctx, self.wants_line_numbers(), &user_text)
    }
}
