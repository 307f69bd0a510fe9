// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Deserialize;
use serde_json::{json, Value};

use conduit_context::{ContextAssembler, PromptSpec};
use conduit_model::ToolModelCategory;

use crate::builtin::pack_reference_examples;
use crate::prompts::TESTGEN_PROMPT;
use crate::tool::{
    base_schema, PreparedPrompt, Tool, ToolContext, ToolError, ToolRequest,
    TEMPERATURE_ANALYTICAL,
};

/// Share of the content budget spent on test style examples.
const TEST_EXAMPLES_BUDGET_PERCENT: usize = 25;

/// Test generation with optional style-example files.
pub struct TestGenTool;

#[derive(Debug, Deserialize)]
struct TestGenFields {
    #[serde(default)]
    test_examples: Vec<String>,
}

impl Tool for TestGenTool {
    fn name(&self) -> &str {
        "testgen"
    }

    fn description(&self) -> &str {
        "COMPREHENSIVE TEST GENERATION - generate tests for the named code, covering \
         happy paths, edge cases, and failure modes. Pass existing test files as \
         test_examples to match their framework and style."
    }

    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value {
        base_schema(
            auto_mode,
            available_models,
            json!({
                "test_examples": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Existing test files used as style/pattern reference \
                                    (absolute paths). A quarter of the context budget is \
                                    reserved for these."
                }
            }),
            &["files", "prompt"],
        )
    }

    fn category(&self) -> ToolModelCategory {
        ToolModelCategory::ExtendedReasoning
    }

    fn default_temperature(&self) -> f64 {
        TEMPERATURE_ANALYTICAL
    }

    fn system_prompt(&self) -> &str {
        TESTGEN_PROMPT
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
                "testgen requires the files to generate tests for".into(),
            ));
        }
        let fields: TestGenFields = request.extra()?;

        // Style examples first: they get a fixed slice of the budget, and a
        // file listed both as code-under-test and example embeds once (as
        // code under test).
        let (examples_section, examples_tokens) = pack_reference_examples(
            ctx,
            &request.files,
            &fields.test_examples,
            TEST_EXAMPLES_BUDGET_PERCENT,
            self.wants_line_numbers(),
        );

        let user_text = format!("## Test Generation Request\n{}", request.prompt);

        let assembler = ContextAssembler::new(ctx.sandbox, ctx.conversations);
        let spec = PromptSpec {
            user_prompt: user_text.clone(),
            files: request.files.clone(),
            continuation_id: request.continuation_id.clone(),
            context_window: ctx.capabilities.context_window,
            line_numbers: self.wants_line_numbers(),
            // The examples already spent part of the budget.
            reserve_tokens: examples_tokens,
        };
        let assembled = assembler.assemble(&spec);

        let mut text = String::new();
        if !examples_section.trim().is_empty() {
            text.push_str(&format!(
                "=== TEST STYLE EXAMPLES ===\n{examples_section}\n=== END STYLE EXAMPLES ===\n\n\
                 Use the style examples above as a reference for framework, naming, and \
                 layout.\n\n"
            ));
        }
        text.push_str(&ContextAssembler::compose(&assembled, &user_text));
        if request.use_websearch {
            text.push_str(crate::builtin::websearch_instruction());
        }

        let mut files = assembled.requested_files;
        files.extend(fields.test_examples);
        files.sort();
        files.dedup();

        Ok(PreparedPrompt { text, files })
    }
}
