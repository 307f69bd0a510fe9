// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `conduit-config` — environment-driven configuration for the conduit server.
//!
//! All runtime configuration arrives through environment variables (the
//! server is launched by an MCP host, which passes settings via its `env`
//! block).  [`load()`] reads the process environment once at startup and
//! returns an immutable [`Config`]; nothing in the core re-reads env vars
//! afterwards except the provider credential lookups, which are documented
//! where they occur.

mod loader;
mod schema;

pub use loader::load;
pub use schema::{Config, ConfigError, DEFAULT_CONVERSATION_TTL_HOURS};

/// Environment variable names recognised by [`load()`].
///
/// Provider API keys (`GEMINI_API_KEY`, `OPENAI_API_KEY`, `XAI_API_KEY`,
/// `OPENROUTER_API_KEY`, `CUSTOM_API_URL`/`CUSTOM_API_KEY`, `DIAL_API_KEY`)
/// and per-provider allow-lists (`<PROVIDER>_ALLOWED_MODELS`) are read by
/// `conduit-model` and are listed there.
pub mod env {
    /// Concrete model name, or the literal `"auto"` to enable auto mode.
    pub const DEFAULT_MODEL: &str = "DEFAULT_MODEL";
    /// Absolute path of the directory file access is sandboxed to.
    pub const WORKSPACE_ROOT: &str = "CONDUIT_WORKSPACE_ROOT";
    /// Container-side path prefix rewritten to the workspace root.
    pub const CONTAINER_ROOT: &str = "CONDUIT_CONTAINER_ROOT";
    /// Explicit user home directory (overrides platform detection).
    pub const USER_HOME: &str = "CONDUIT_USER_HOME";
    /// Path to the custom-models JSON registry file.
    pub const CUSTOM_MODELS_CONFIG_PATH: &str = "CUSTOM_MODELS_CONFIG_PATH";
    /// Conversation thread inactivity timeout, in hours.
    pub const CONVERSATION_TIMEOUT_HOURS: &str = "CONVERSATION_TIMEOUT_HOURS";
    /// Log level filter seed (trace/debug/info/warn/error).
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}
