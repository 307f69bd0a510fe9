// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The built-in developer-assistance tools.

mod analyze;
mod chat;
mod codereview;
mod debug;
mod precommit;
mod refactor;
mod testgen;
mod thinkdeep;

pub use analyze::AnalyzeTool;
pub use chat::ChatTool;
pub use codereview::CodeReviewTool;
pub use debug::DebugTool;
pub use precommit::PrecommitTool;
pub use refactor::RefactorTool;
pub use testgen::TestGenTool;
pub use thinkdeep::ThinkDeepTool;

use conduit_context::{ContextAssembler, PromptSpec};

use crate::registry::ToolRegistry;
use crate::tool::{PreparedPrompt, ToolContext, ToolError, ToolRequest};

/// Register every built-in tool.
pub fn register_builtin_tools(registry: &mut ToolRegistry) {
    registry.register(ChatTool);
    registry.register(ThinkDeepTool);
    registry.register(CodeReviewTool);
    registry.register(DebugTool);
    registry.register(AnalyzeTool);
    registry.register(PrecommitTool);
    registry.register(TestGenTool);
    registry.register(RefactorTool);
}

/// Standard prompt assembly shared by the file-context tools: conversation
/// continuation, request-file deduplication, budgeted packing, and the final
/// composition around `user_text`.
pub(crate) fn assemble_standard(
    request: &ToolRequest,
    ctx: &ToolContext<'_>,
    line_numbers: bool,
    user_text: &str,
) -> Result<PreparedPrompt, ToolError> {
    let assembler = ContextAssembler::new(ctx.sandbox, ctx.conversations);
    let spec = PromptSpec {
        user_prompt: user_text.to_string(),
        files: request.files.clone(),
        continuation_id: request.continuation_id.clone(),
        context_window: ctx.capabilities.context_window,
        line_numbers,
        reserve_tokens: 0,
    };
    let assembled = assembler.assemble(&spec);
    let mut text = ContextAssembler::compose(&assembled, user_text);
    if request.use_websearch {
        text.push_str(websearch_instruction());
    }
    Ok(PreparedPrompt {
        text,
        files: assembled.requested_files,
    })
}

/// Appended when the caller enables web search: the model cannot browse
/// itself, but it can ask the host agent to run searches on its behalf.
pub(crate) fn websearch_instruction() -> &'static str {
    "\n\nWeb search is available: when current documentation, known issues, or \
     best practices would improve this answer, list the specific searches the \
     calling agent should run and what each would clarify."
}

/// Budgeted packing of reference/style example files, deduplicated against
/// the main file list (a file in both slots embeds once, as main content).
///
/// `fraction` is the share of the content budget the examples may spend —
/// test generation and refactoring give style examples a quarter and leave
/// the rest for the code under work.
pub(crate) fn pack_reference_examples(
    ctx: &ToolContext<'_>,
    main_files: &[String],
    examples: &[String],
    fraction_percent: usize,
    line_numbers: bool,
) -> (String, usize) {
    let main_set: std::collections::BTreeSet<&String> = main_files.iter().collect();
    let filtered: Vec<String> = examples
        .iter()
        .filter(|e| !main_set.contains(e))
        .cloned()
        .collect();
    if filtered.is_empty() {
        return (String::new(), 0);
    }

    let budget =
        ContextAssembler::content_budget(ctx.capabilities.context_window) * fraction_percent / 100;
    let packed = conduit_context::read_files_to_budget(
        ctx.sandbox,
        &filtered,
        budget,
        1_000,
        line_numbers,
    );
    (packed.content, packed.tokens_used)
}
