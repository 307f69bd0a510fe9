// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `conduit-model` — the provider layer.
//!
//! Everything between "a tool wants a completion" and "bytes on the wire"
//! lives here: the capability model, the restriction policy, alias
//! resolution, per-provider request shaping, retry classification, the
//! process-wide provider registry, and auto-mode model selection.

pub mod capabilities;
pub mod catalog;
pub mod error;
pub mod mock;
pub mod provider;
pub mod registry;
pub mod restrictions;
pub mod retry;
pub mod selection;

pub(crate) mod openai_compat;

mod custom;
mod dial;
mod google;
mod openai;
mod openrouter;
mod xai;

pub use capabilities::{
    ModelCapabilities, ModelResponse, ProviderKind, TemperatureConstraint, ThinkingMode,
    TokenUsage,
};
pub use catalog::ModelRegistry;
pub use custom::CustomProvider;
pub use dial::DialProvider;
pub use error::{ErrorKind, ProviderError};
pub use google::GoogleProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use openai_compat::{build_chat_body, AuthStyle};
pub use openrouter::OpenRouterProvider;
pub use provider::{GenerateOptions, ModelProvider, ModelTable};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use restrictions::RestrictionService;
pub use selection::ToolModelCategory;
pub use xai::XAiProvider;
