// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::{json, Value};

use conduit_model::ToolModelCategory;

use crate::builtin::assemble_standard;
use crate::prompts::CHAT_PROMPT;
use crate::tool::{
    base_schema, PreparedPrompt, Tool, ToolContext, ToolError, ToolRequest, TEMPERATURE_BALANCED,
};

/// General development chat: questions, brainstorming, second opinions.
pub struct ChatTool;

impl Tool for ChatTool {
    fn name(&self) -> &str {
        "chat"
    }

    fn description(&self) -> &str {
        "GENERAL CHAT & COLLABORATIVE THINKING - ask questions, brainstorm, get second \
         opinions, or discuss code with optional file context. Use for open-ended \
         development conversations that do not fit a more specific tool."
    }

    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value {
        base_schema(auto_mode, available_models, json!({}), &["prompt"])
    }

    fn category(&self) -> ToolModelCategory {
        ToolModelCategory::FastResponse
    }

    fn default_temperature(&self) -> f64 {
        TEMPERATURE_BALANCED
    }

    fn system_prompt(&self) -> &str {
        CHAT_PROMPT
    }

    fn prepare_prompt(
        &self,
        request: &ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<PreparedPrompt, ToolError> {
        if request.prompt.trim().is_empty() {
            return Err(ToolError::InvalidRequest("prompt must not be empty".into()));
        }
        assemble_standard(request, ctx, self.wants_line_numbers(), &request.prompt)
    }
}
