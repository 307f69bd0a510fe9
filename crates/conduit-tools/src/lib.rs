// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `conduit-tools` — the developer-assistance tools and the driver that
//! runs them.
//!
//! A tool contributes a name, a JSON schema, a model category, a system
//! prompt, and a prompt builder; the [`driver::ToolDriver`] owns everything
//! else: validation, model selection, context assembly, the provider call,
//! metadata, and conversation recording.

pub mod builtin;
pub mod driver;
pub mod prompts;
pub mod registry;
pub mod tool;

pub use builtin::register_builtin_tools;
pub use driver::ToolDriver;
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{
    base_schema, OutputStatus, PreparedPrompt, Tool, ToolContext, ToolError, ToolOutput,
    ToolRequest, MAX_PROMPT_CHARS, TEMPERATURE_ANALYTICAL, TEMPERATURE_BALANCED,
    TEMPERATURE_CREATIVE,
};
