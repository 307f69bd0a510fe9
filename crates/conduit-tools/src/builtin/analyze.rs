// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_model::ToolModelCategory;

use crate::builtin::assemble_standard;
use crate::prompts::ANALYZE_PROMPT;
use crate::tool::{
    base_schema, PreparedPrompt, Tool, ToolContext, ToolError, ToolRequest,
    TEMPERATURE_ANALYTICAL,
};

/// General-purpose code and architecture analysis.
pub struct AnalyzeTool;

#[derive(Debug, Deserialize)]
struct AnalyzeFields {
    #[serde(default = "default_analysis_type")]
    analysis_type: String,
    #[serde(default)]
    output_format: Option<String>,
}

fn default_analysis_type() -> String {
    "general".into()
}

impl Tool for AnalyzeTool {
    fn name(&self) -> &str {
        "analyze"
    }

    fn description(&self) -> &str {
        "ANALYZE FILES & ARCHITECTURE - answer questions about the named code: \
         structure, data flow, dependencies, complexity. For understanding, not \
         for finding bugs (use codereview for that)."
    }

    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value {
        base_schema(
            auto_mode,
            available_models,
            json!({
                "analysis_type": {
                    "type": "string",
                    "enum": ["architecture", "performance", "security", "quality", "general"],
                    "default": "general",
                    "description": "Lens to analyze the code through."
                },
                "output_format": {
                    "type": "string",
                    "enum": ["summary", "detailed", "actionable"],
                    "description": "Preferred shape of the answer."
                }
            }),
            &["files", "prompt"],
        )
    }

    fn category(&self) -> ToolModelCategory {
        ToolModelCategory::Balanced
    }

    fn default_temperature(&self) -> f64 {
        TEMPERATURE_ANALYTICAL
    }

    fn system_prompt(&self) -> &str {
        ANALYZE_PROMPT
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
                "analyze requires at least one file or directory".into(),
            ));
        }
        let fields: AnalyzeFields = request.extra()?;

        let mut user_text = format!(
            "## Analysis Request ({})\n{}\n",
            fields.analysis_type, request.prompt
        );
        if let Some(format) = &fields.output_format {
            user_text.push_str(&format!("\nPreferred output format: {format}\n"));
        }

        assemble_standard(request, ctx, self.wants_line_numbers(), &user_text)
    }
}
