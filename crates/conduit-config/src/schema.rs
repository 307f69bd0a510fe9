// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default thread inactivity timeout when `CONVERSATION_TIMEOUT_HOURS` is unset.
pub const DEFAULT_CONVERSATION_TTL_HOURS: u64 = 3;

/// Immutable server configuration assembled from the environment at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Concrete model name, or `"auto"` to let the registry pick per category.
    pub default_model: String,
    /// Absolute directory that bounds all file access.
    pub workspace_root: PathBuf,
    /// Container-side prefix rewritten to `workspace_root` before validation.
    /// `None` disables path translation.
    pub container_root: Option<PathBuf>,
    /// Explicit user home directory.  `None` falls back to platform detection.
    pub user_home: Option<PathBuf>,
    /// Path to the custom-models JSON registry.  `None` uses the bundled file.
    pub custom_models_path: Option<PathBuf>,
    /// Conversation thread inactivity timeout, in hours.
    pub conversation_ttl_hours: u64,
    /// Log level filter seed.
    pub log_level: String,
}

impl Config {
    /// Returns true when the caller must supply a concrete model on every call.
    pub fn is_auto_mode(&self) -> bool {
        self.default_model.eq_ignore_ascii_case("auto")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: "auto".to_string(),
            workspace_root: PathBuf::from("/"),
            container_root: None,
            user_home: None,
            custom_models_path: None,
            conversation_ttl_hours: DEFAULT_CONVERSATION_TTL_HOURS,
            log_level: "info".to_string(),
        }
    }
}

/// Startup configuration errors.  All of these abort boot.
#[derive(Debug)]
pub enum ConfigError {
    /// The workspace root is not an absolute path.
    WorkspaceRootNotAbsolute(PathBuf),
    /// The workspace root is the filesystem root, which would sandbox nothing.
    WorkspaceRootIsFilesystemRoot,
    /// The workspace root does not exist or is not a directory.
    WorkspaceRootInvalid(PathBuf),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkspaceRootNotAbsolute(p) => write!(
                f,
                "workspace root must be an absolute path, got {}",
                p.display()
            ),
            Self::WorkspaceRootIsFilesystemRoot => write!(
                f,
                "workspace root cannot be the filesystem root; \
                 that would grant access to the entire filesystem"
            ),
            Self::WorkspaceRootInvalid(p) => write!(
                f,
                "workspace root {} does not exist or is not a directory",
                p.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

// ─── Unit tests ──────────────────────────────────────────────────────────────
