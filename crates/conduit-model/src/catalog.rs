// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Custom-models registry: JSON-file-backed capabilities for the aggregator
//! and custom/local providers.
//!
//! The registry file lists models the aggregator can reach and any models
//! that only exist behind a custom endpoint (`is_custom: true`).  Both the
//! OpenRouter and Custom providers share one registry so a given alias means
//! the same model everywhere.
//!
//! Configuration errors in this file are fatal at startup: a duplicate alias
//! or malformed JSON aborts boot rather than silently serving an empty
//! registry.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::capabilities::{ModelCapabilities, ProviderKind, TemperatureConstraint};
use crate::error::ProviderError;
use crate::provider::ModelTable;

/// One entry in the registry file.
#[derive(Debug, Deserialize)]
struct RegistryEntry {
    model_name: String,
    #[serde(default)]
    aliases: Vec<String>,
    context_window: u32,
    max_output_tokens: u32,
    #[serde(default)]
    supports_extended_thinking: bool,
    #[serde(default = "default_true")]
    supports_system_prompts: bool,
    #[serde(default = "default_true")]
    supports_streaming: bool,
    #[serde(default)]
    supports_function_calling: bool,
    #[serde(default)]
    supports_images: bool,
    #[serde(default)]
    max_image_size_mb: f64,
    #[serde(default = "default_true")]
    supports_temperature: bool,
    /// `"fixed"`, `"range"`, or `"discrete"`; absent means `"range"`.
    #[serde(default)]
    temperature_constraint: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_custom: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    models: Vec<RegistryEntry>,
}

/// The loaded registry: an alias table over the file's models.
#[derive(Debug)]
pub struct ModelRegistry {
    table: ModelTable,
}

impl ModelRegistry {
    /// Load the registry from `path`, or the bundled file when `path` is
    /// `None`.  Malformed JSON and duplicate aliases are both fatal.
    pub fn load(path: Option<&Path>) -> Result<Self, ProviderError> {
        let text = match path {
            Some(p) => std::fs::read_to_string(p).map_err(|e| {
                ProviderError::Registry(format!(
                    "cannot read custom-models registry {}: {e}",
                    p.display()
                ))
            })?,
            None => include_str!("../conf/custom_models.json").to_string(),
        };
        Self::from_json(&text)
    }

    /// Parse registry JSON.  Exposed for tests.
    pub fn from_json(text: &str) -> Result<Self, ProviderError> {
        let file: RegistryFile = serde_json::from_str(text)
            .map_err(|e| ProviderError::Registry(format!("malformed custom-models JSON: {e}")))?;

        let entries: Vec<ModelCapabilities> = file.models.into_iter().map(entry_to_caps).collect();
        let table = ModelTable::new(entries)?;
        debug!(
            models = table.len(),
            "custom-models registry loaded"
        );
        Ok(Self { table })
    }

    /// Resolve a name or alias to its capabilities, case-insensitively.
    pub fn resolve(&self, name_or_alias: &str) -> Option<&ModelCapabilities> {
        let canonical = self.table.resolve(name_or_alias);
        self.table.get(&canonical)
    }

    pub fn capabilities(&self, name_or_alias: &str) -> Option<ModelCapabilities> {
        self.resolve(name_or_alias).cloned()
    }

    /// Canonical model names in deterministic order.
    pub fn list_models(&self) -> Vec<String> {
        self.table.canonical_names()
    }

    /// All lowercased names and aliases.
    pub fn list_aliases(&self) -> Vec<String> {
        self.table.all_known()
    }

    pub fn table(&self) -> &ModelTable {
        &self.table
    }
}

fn entry_to_caps(entry: RegistryEntry) -> ModelCapabilities {
    let provider = if entry.is_custom {
        ProviderKind::Custom
    } else {
        ProviderKind::OpenRouter
    };
    let friendly = if entry.is_custom {
        format!("Custom ({})", entry.model_name)
    } else {
        format!("OpenRouter ({})", entry.model_name)
    };
    let temperature = TemperatureConstraint::from_tag(
        entry.temperature_constraint.as_deref().unwrap_or("range"),
    );

    ModelCapabilities {
        provider,
        model_name: entry.model_name,
        friendly_name: friendly,
        aliases: entry.aliases,
        context_window: entry.context_window,
        max_output_tokens: entry.max_output_tokens,
        supports_extended_thinking: entry.supports_extended_thinking,
        supports_system_prompts: entry.supports_system_prompts,
        supports_streaming: entry.supports_streaming,
        supports_function_calling: entry.supports_function_calling,
        supports_images: entry.supports_images,
        max_image_size_mb: entry.max_image_size_mb,
        supports_temperature: entry.supports_temperature,
        max_thinking_tokens: 0,
        is_custom: entry.is_custom,
        is_generic: false,
        description: entry.description,
        temperature,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
