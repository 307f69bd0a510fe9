// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_model::ToolModelCategory;

use crate::builtin::assemble_standard;
use crate::prompts::DEBUG_PROMPT;
use crate::tool::{
    base_schema, PreparedPrompt, Tool, ToolContext, ToolError, ToolRequest,
    TEMPERATURE_ANALYTICAL,
};

/// Root-cause analysis for errors with diagnostic context.
pub struct DebugTool;

#[derive(Debug, Deserialize)]
struct DebugFields {
    #[serde(default)]
    error_context: Option<String>,
    #[serde(default)]
    runtime_info: Option<String>,
    #[serde(default)]
    previous_attempts: Option<String>,
}

impl Tool for DebugTool {
    fn name(&self) -> &str {
        "debug"
    }

    fn description(&self) -> &str {
        "DEBUG & ROOT CAUSE ANALYSIS - diagnose an error from its description, stack \
         traces or logs (error_context), and the relevant code. Returns ranked \
         hypotheses with minimal fixes and verification steps."
    }

    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value {
        base_schema(
            auto_mode,
            available_models,
            json!({
                "error_context": {
                    "type": "string",
                    "description": "Stack trace, log excerpt, or other diagnostic output."
                },
                "runtime_info": {
                    "type": "string",
                    "description": "Environment details: OS, versions, configuration."
                },
                "previous_attempts": {
                    "type": "string",
                    "description": "What has already been tried and what happened."
                }
            }),
            &["prompt"],
        )
    }

    fn category(&self) -> ToolModelCategory {
        ToolModelCategory::ExtendedReasoning
    }

    fn default_temperature(&self) -> f64 {
        TEMPERATURE_ANALYTICAL
    }

    fn system_prompt(&self) -> &str {
        DEBUG_PROMPT
    }

    fn wants_line_numbers(&self) -> bool {
        true
    }

    fn prepare_prompt(
        &self,
        request: &ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<PreparedPrompt, ToolError> {
        if request.prompt.trim().is_empty() {
            return Err(ToolError::InvalidRequest(
                "prompt must describe the error being debugged".into(),
            ));
        }
        let fields: DebugFields = request.extra()?;

        let mut user_text = format!("## Error Description\n{}\n", request.prompt);
        if let Some(context) = &fields.error_context {
            user_text.push_str(&format!("\n## Diagnostic Context\n{context}\n"));
        }
        if let Some(runtime) = &fields.runtime_info {
            user_text.push_str(&format!("\n## Runtime Environment\n{runtime}\n"));
        }
        if let Some(attempts) = &fields.previous_attempts {
            user_text.push_str(&format!("\n## Previous Attempts\n{attempts}\n"));
        }

        assemble_standard(request, ctx, self.wants_line_numbers(), &user_text)
    }
}
