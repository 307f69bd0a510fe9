// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_model::ToolModelCategory;

use crate::builtin::assemble_standard;
use crate::prompts::CODEREVIEW_PROMPT;
use crate::tool::{
    base_schema, PreparedPrompt, Tool, ToolContext, ToolError, ToolRequest,
    TEMPERATURE_ANALYTICAL,
};

/// Professional review of explicitly named code.
pub struct CodeReviewTool;

#[derive(Debug, Deserialize)]
struct CodeReviewFields {
    #[serde(default = "default_review_type")]
    review_type: String,
    #[serde(default = "default_severity")]
    severity_filter: String,
    #[serde(default)]
    focus_on: Option<String>,
    #[serde(default)]
    standards: Option<String>,
}

fn default_review_type() -> String {
    "full".into()
}

fn default_severity() -> String {
    "all".into()
}

impl Tool for CodeReviewTool {
    fn name(&self) -> &str {
        "codereview"
    }

    fn description(&self) -> &str {
        "PROFESSIONAL CODE REVIEW - comprehensive review of the named files: bugs, \
         security, performance, maintainability. Findings come back ordered by \
         severity with concrete fixes."
    }

    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value {
        base_schema(
            auto_mode,
            available_models,
            json!({
                "review_type": {
                    "type": "string",
                    "enum": ["full", "security", "performance", "quick"],
                    "default": "full",
                    "description": "Type of review to perform."
                },
                "severity_filter": {
                    "type": "string",
                    "enum": ["critical", "high", "medium", "all"],
                    "default": "all",
                    "description": "Minimum severity to report."
                },
                "focus_on": {
                    "type": "string",
                    "description": "Specific aspects to focus on."
                },
                "standards": {
                    "type": "string",
                    "description": "Coding standards to enforce during the review."
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
        CODEREVIEW_PROMPT
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
                "codereview requires at least one file or directory".into(),
            ));
        }
        let fields: CodeReviewFields = request.extra()?;

        let mut user_text = String::new();
        user_text.push_str("## Review Parameters\n");
        user_text.push_str(&format!("- Review Type: {}\n", fields.review_type));
        user_text.push_str(&format!("- Severity Filter: {}\n", fields.severity_filter));
        if let Some(focus) = &fields.focus_on {
            user_text.push_str(&format!("- Focus Areas: {focus}\n"));
        }
        if let Some(standards) = &fields.standards {
            user_text.push_str(&format!("- Standards: {standards}\n"));
        }
        user_text.push_str(&format!("\n## Review Request\n{}", request.prompt));

        assemble_standard(request, ctx, self.wants_line_numbers(), &user_text)
    }
}
