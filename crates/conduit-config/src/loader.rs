// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::env;
use crate::schema::{Config, ConfigError, DEFAULT_CONVERSATION_TTL_HOURS};

/// Assemble the server [`Config`] from the process environment.
///
/// The workspace root is validated eagerly: it must be absolute, must not be
/// the filesystem root, and must name an existing directory.  When
/// `CONDUIT_WORKSPACE_ROOT` is unset, the current working directory is used
/// (the MCP host launches the server inside the project it serves).
pub fn load() -> anyhow::Result<Config> {
    let workspace_root = match read_var(env::WORKSPACE_ROOT) {
        Some(raw) => PathBuf::from(raw),
        None => std::env::current_dir()?,
    };
    let workspace_root = validate_workspace_root(workspace_root)?;

    let conversation_ttl_hours = read_var(env::CONVERSATION_TIMEOUT_HOURS)
        .and_then(|raw| match raw.parse::<u64>() {
            Ok(h) if h > 0 => Some(h),
            _ => {
                warn!(
                    value = %raw,
                    "invalid {} — using default of {} hours",
                    env::CONVERSATION_TIMEOUT_HOURS,
                    DEFAULT_CONVERSATION_TTL_HOURS
                );
                None
            }
        })
        .unwrap_or(DEFAULT_CONVERSATION_TTL_HOURS);

    let config = Config {
        default_model: read_var(env::DEFAULT_MODEL).unwrap_or_else(|| "auto".to_string()),
        workspace_root,
        container_root: read_var(env::CONTAINER_ROOT).map(PathBuf::from),
        user_home: read_var(env::USER_HOME).map(PathBuf::from),
        custom_models_path: read_var(env::CUSTOM_MODELS_CONFIG_PATH).map(PathBuf::from),
        conversation_ttl_hours,
        log_level: read_var(env::LOG_LEVEL).unwrap_or_else(|| "info".to_string()),
    };

    debug!(
        default_model = %config.default_model,
        workspace_root = %config.workspace_root.display(),
        "configuration loaded"
    );
    Ok(config)
}

/// Read an env var, treating empty or whitespace-only values as unset.
fn read_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) => {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

fn validate_workspace_root(root: PathBuf) -> Result<PathBuf, ConfigError> {
    if !root.is_absolute() {
        return Err(ConfigError::WorkspaceRootNotAbsolute(root));
    }
    if is_filesystem_root(&root) {
        return Err(ConfigError::WorkspaceRootIsFilesystemRoot);
    }
    let canonical = std::fs::canonicalize(&root)
        .map_err(|_| ConfigError::WorkspaceRootInvalid(root.clone()))?;
    if !canonical.is_dir() {
        return Err(ConfigError::WorkspaceRootInvalid(root));
    }
    // Canonicalization can resolve a symlink to "/"; re-check afterwards.
    if is_filesystem_root(&canonical) {
        return Err(ConfigError::WorkspaceRootIsFilesystemRoot);
    }
    Ok(canonical)
}

fn is_filesystem_root(p: &Path) -> bool {
    p.parent().is_none()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_workspace_root_is_rejected() {
        let err = validate_workspace_root(PathBuf::from("relative/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::WorkspaceRootNotAbsolute(_)));
    }

    #[test]
    fn filesystem_root_is_rejected() {
        let err = validate_workspace_root(PathBuf::from("/")).unwrap_err();
        assert!(matches!(err, ConfigError::WorkspaceRootIsFilesystemRoot));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let err =
            validate_workspace_root(PathBuf::from("/nonexistent-conduit-test-dir")).unwrap_err();
        assert!(matches!(err, ConfigError::WorkspaceRootInvalid(_)));
    }

    #[test]
    fn existing_directory_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let root = validate_workspace_root(dir.path().to_path_buf()).unwrap();
        assert!(root.is_absolute());
        assert!(root.is_dir());
    }

    #[test]
    fn read_var_treats_whitespace_as_unset() {
        // Uses a name no other test sets to avoid env races.
        std::env::set_var("CONDUIT_TEST_WHITESPACE_VAR", "   ");
        assert!(read_var("CONDUIT_TEST_WHITESPACE_VAR").is_none());
        std::env::remove_var("CONDUIT_TEST_WHITESPACE_VAR");
    }
}
